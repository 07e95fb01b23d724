use axum::Router;

use crate::state::SharedState;

pub mod body;
pub mod caller;
pub mod challenges;
pub mod docs;
pub mod guest;
pub mod health;
pub mod matches;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(matches::router())
        .merge(challenges::router())
        .merge(guest::router())
        .merge(docs::router());

    api_router.with_state(state)
}
