//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player or guest name, in characters.
pub const MAX_NAME_LENGTH: usize = 64;

/// Only tennis matches can be scored.
pub fn validate_game_type(game_type: &str) -> Result<(), ValidationError> {
    if game_type.trim().eq_ignore_ascii_case("tennis") {
        return Ok(());
    }
    let mut err = ValidationError::new("game_type");
    err.message = Some(format!("unsupported game type `{game_type}`, only `tennis` is scored").into());
    Err(err)
}

/// Names must contain something other than whitespace and stay under [`MAX_NAME_LENGTH`].
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("name_empty");
        err.message = Some("player names must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("player names are limited to {MAX_NAME_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}
