use std::{net::SocketAddr, sync::Arc};

use courtside_back::{
    build_router, config::AppConfig, dao::match_store::memory::InMemoryMatchStore,
    state::AppState,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

struct TestServer {
    addr: SocketAddr,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::new(AppConfig::default());
        state
            .set_match_store(Arc::new(InMemoryMatchStore::new()))
            .await;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn post(&self, path: &str, body: Value, user: Option<Uuid>) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(user) = user {
            request = request.header("X-User-Id", user.to_string());
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str, user: Option<Uuid>) -> (StatusCode, Value) {
        let mut request = self.client.get(self.url(path));
        if let Some(user) = user {
            request = request.header("X-User-Id", user.to_string());
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

async fn create_guest_singles(server: &TestServer) -> String {
    let (status, body) = server
        .post(
            "/guest-matches",
            json!({"game_type": "tennis", "match_type": "singles", "players": ["Ana", "Bo"]}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["match_id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn healthcheck_reports_ok_with_a_store() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn guest_match_plays_to_completion_and_shows_in_history() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;

    let (status, detail) = server.get(&format!("/guest-matches/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "not_started");
    assert_eq!(detail["player1"]["name"], "Ana");

    let mut last = Value::Null;
    for _ in 0..48 {
        let (status, body) = server
            .post(
                &format!("/guest-matches/{id}/points"),
                json!({"winner": "player1"}),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }

    assert_eq!(last["status"], "completed");
    assert_eq!(last["winner"], "player1");
    assert_eq!(last["winner_name"], "Ana");
    assert_eq!(last["score"], "2 - 0");
    assert_eq!(last["player1_points"], 0);
    assert_eq!(last["player2_points"], 0);

    let (status, after) = server
        .post(
            &format!("/guest-matches/{id}/points"),
            json!({"winner": "player2"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["version"], last["version"]);

    let (status, history) = server.get("/guest-matches/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id);
}

#[tokio::test]
async fn invalid_side_is_rejected_without_changes() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;

    let (status, body) = server
        .post(
            &format!("/guest-matches/{id}/points"),
            json!({"winner": "player3"}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("player3"));

    let (_, detail) = server.get(&format!("/guest-matches/{id}"), None).await;
    assert_eq!(detail["status"], "not_started");
    assert_eq!(detail["version"], 0);
}

#[tokio::test]
async fn extra_stats_overwrite_per_key() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;
    let path = format!("/guest-matches/{id}/points");

    server
        .post(
            &path,
            json!({"winner": "player1", "extra_stats": {"player1": {"aces": 3, "faults": 1}}}),
            None,
        )
        .await;
    let (_, detail) = server
        .post(
            &path,
            json!({"winner": "player1", "extra_stats": {"player1": {"aces": 5}}}),
            None,
        )
        .await;

    assert_eq!(detail["extra_stats"]["player1"]["aces"], 5);
    assert_eq!(detail["extra_stats"]["player1"]["faults"], 1);
}

#[tokio::test]
async fn extra_stats_accept_short_side_keys() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;

    let (status, detail) = server
        .post(
            &format!("/guest-matches/{id}/points"),
            json!({"winner": "a", "extra_stats": {"a": {"aces": 3}, "b": {"faults": 2}}}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["player1_points"], 1);
    assert_eq!(detail["extra_stats"]["player1"]["aces"], 3);
    assert_eq!(detail["extra_stats"]["player2"]["faults"], 2);
}

#[tokio::test]
async fn unknown_extra_stats_side_is_rejected_before_scoring() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;

    let (status, body) = server
        .post(
            &format!("/guest-matches/{id}/points"),
            json!({"winner": "a", "extra_stats": {"a": {"aces": 3}, "player3": {"x": 1}}}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("player3"));

    let (_, detail) = server.get(&format!("/guest-matches/{id}"), None).await;
    assert_eq!(detail["player1_points"], 0);
    assert_eq!(detail["version"], 0);
    assert!(detail["extra_stats"]["player1"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn guest_roster_size_is_validated() {
    let server = TestServer::start().await;
    let (status, _) = server
        .post(
            "/guest-matches",
            json!({"game_type": "tennis", "match_type": "doubles", "players": ["Ana", "Bo"]}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ending_a_guest_match_counts_games() {
    let server = TestServer::start().await;
    let id = create_guest_singles(&server).await;

    for _ in 0..4 {
        server
            .post(
                &format!("/guest-matches/{id}/points"),
                json!({"winner": "player2"}),
                None,
            )
            .await;
    }

    let (status, detail) = server
        .post(&format!("/guest-matches/{id}/end"), json!({}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "completed");
    assert_eq!(detail["winner"], "player2");
    assert_eq!(detail["winner_name"], "Bo");
}

#[tokio::test]
async fn authenticated_routes_require_a_caller() {
    let server = TestServer::start().await;
    let (status, body) = server
        .post("/matches", json!({"opponent_id": Uuid::new_v4()}), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn only_participants_can_score_a_match() {
    let server = TestServer::start().await;
    let (alice, bob, mallory) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let (status, created) = server
        .post(
            "/matches",
            json!({"opponent_id": bob, "opponent_name": "Bob", "game_type": "tennis"}),
            Some(alice),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["match_id"].as_str().unwrap().to_owned();

    let (status, _) = server
        .post(
            &format!("/matches/{id}/points"),
            json!({"winner": "player1"}),
            Some(mallory),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, detail) = server
        .post(
            &format!("/matches/{id}/games"),
            json!({"winner": "player2"}),
            Some(bob),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "in_progress");
    assert_eq!(detail["sets"][0]["player2_games"], 1);
    assert_eq!(detail["player2"]["name"], "Bob");

    let (status, _) = server.get(&format!("/matches/{id}"), Some(mallory)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completed_direct_match_appears_in_both_histories() {
    let server = TestServer::start().await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let (_, created) = server
        .post("/matches", json!({"opponent_id": bob}), Some(alice))
        .await;
    let id = created["match_id"].as_str().unwrap().to_owned();

    let (status, detail) = server
        .post(&format!("/matches/{id}/complete"), json!({}), Some(alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "completed");
    assert!(detail["winner"].is_null());

    for user in [alice, bob] {
        let (status, history) = server.get("/matches/history", Some(user)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn active_matches_list_unfinished_games_newest_first() {
    let server = TestServer::start().await;
    let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut ids = Vec::new();
    for opponent in [bob, carol, bob] {
        let (_, created) = server
            .post("/matches", json!({"opponent_id": opponent}), Some(alice))
            .await;
        ids.push(created["match_id"].as_str().unwrap().to_owned());
    }
    server
        .post(&format!("/matches/{}/complete", ids[2]), json!({}), Some(alice))
        .await;

    let (status, listed) = server.get("/matches", Some(alice)).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[1].as_str(), ids[0].as_str()]);

    let (_, for_bob) = server.get("/matches", Some(bob)).await;
    assert_eq!(for_bob.as_array().unwrap().len(), 1);
    assert_eq!(for_bob[0]["id"], ids[0]);
}

#[tokio::test]
async fn challenge_match_is_created_once() {
    let server = TestServer::start().await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let challenge = Uuid::new_v4();
    let path = format!("/challenges/{challenge}/match");

    let (status, first) = server
        .post(&path, json!({"opponent_id": bob}), Some(alice))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "in_progress");
    assert_eq!(first["challenge_id"], challenge.to_string());

    let (status, second) = server
        .post(&path, json!({"opponent_id": alice}), Some(bob))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    let (status, scored) = server
        .post(
            &format!("{path}/points"),
            json!({"winner": "player2"}),
            Some(bob),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scored["player2_points"], 1);

    let (status, _) = server
        .get(&format!("/challenges/{}/match", Uuid::new_v4()), Some(alice))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
