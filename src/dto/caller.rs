use uuid::Uuid;

use crate::state::tennis::Participant;

/// Authenticated user as forwarded by the gateway in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub name: Option<String>,
}

impl Caller {
    /// Participant entry for the caller's side; unnamed callers are shown by id.
    pub fn participant(&self) -> Participant {
        user_participant(self.user_id, self.name.as_deref())
    }
}

/// Registered user participant, falling back to the id when no usable name is known.
pub fn user_participant(user_id: Uuid, name: Option<&str>) -> Participant {
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| user_id.to_string());
    Participant::User { user_id, name }
}
