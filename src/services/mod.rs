/// Matches derived from accepted challenges.
pub mod challenge_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Unauthenticated guest quick matches.
pub mod guest_service;
/// Health check service.
pub mod health_service;
/// Matches between registered users.
pub mod match_service;
/// Storage connection supervision and degraded mode handling.
pub mod storage_supervisor;
