use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who is asking for a state change. Identity resolution (session, token)
/// is owned by the upstream gateway; the core only sees the resolved actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Patient(Uuid),
    Doctor(Uuid),
    System,
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Patient(_) => ActorRole::Patient,
            Actor::Doctor(_) => ActorRole::Doctor,
            Actor::System => ActorRole::System,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Actor::Patient(id) | Actor::Doctor(id) => Some(*id),
            Actor::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    System,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::System => write!(f, "system"),
        }
    }
}
