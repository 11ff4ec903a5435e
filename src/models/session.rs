use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The caller on whose behalf an operation runs. Passed explicitly into every
/// service call instead of being read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Professor,
    Admin,
}

impl Session {
    pub fn student(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Student }
    }

    pub fn professor(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Professor }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "professor" => Some(Role::Professor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}
