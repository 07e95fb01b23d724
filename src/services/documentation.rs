use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Courtside Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::active_matches,
        crate::routes::matches::create_match,
        crate::routes::matches::match_history,
        crate::routes::matches::get_match,
        crate::routes::matches::join_match,
        crate::routes::matches::record_point,
        crate::routes::matches::record_game,
        crate::routes::matches::complete_match,
        crate::routes::challenges::start_challenge_match,
        crate::routes::challenges::get_challenge_match,
        crate::routes::challenges::record_challenge_point,
        crate::routes::guest::create_guest_match,
        crate::routes::guest::guest_history,
        crate::routes::guest::get_guest_match,
        crate::routes::guest::join_guest_match,
        crate::routes::guest::record_guest_point,
        crate::routes::guest::end_guest_match,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::MatchTypeDto,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::StartChallengeMatchRequest,
            crate::dto::matches::CreateGuestMatchRequest,
            crate::dto::matches::PointRequest,
            crate::dto::matches::GameRequest,
            crate::dto::matches::CompleteMatchRequest,
            crate::dto::matches::MatchCreated,
            crate::dto::matches::MatchDetail,
            crate::dto::matches::MatchHistoryItem,
            crate::dto::matches::ParticipantSummary,
            crate::dto::matches::GuestPlayerSummary,
            crate::dto::matches::SetSummary,
            crate::dto::matches::ExtraStatsSummary,
            crate::state::scoring::ExtraStatsDelta,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Matches between registered users"),
        (name = "challenges", description = "Matches started from accepted challenges"),
        (name = "guest", description = "Unauthenticated quick matches"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scoring_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/matches/{id}/points",
            "/challenges/{challenge_id}/match/points",
            "/guest-matches/{id}/points",
            "/guest-matches/{id}/end",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn match_collection_lists_and_creates() {
        let doc = ApiDoc::openapi();
        let item = &doc.paths.paths["/matches"];
        assert!(item.get.is_some());
        assert!(item.post.is_some());
    }
}
