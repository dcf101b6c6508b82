use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::student::Student;

/// Bearer token issued by the backend. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// An administrator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    pub user_id: u64,
    pub username: String,
    pub email: String,
}

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Identity {
    Student(Student),
    Admin(AdminAccount),
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }

    #[must_use]
    pub fn user_id(&self) -> u64 {
        match self {
            Identity::Student(student) => student.id.value(),
            Identity::Admin(admin) => admin.user_id,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Identity::Student(student) => student.full_name(),
            Identity::Admin(admin) => admin.username.clone(),
        }
    }

    #[must_use]
    pub fn as_student(&self) -> Option<&Student> {
        match self {
            Identity::Student(student) => Some(student),
            Identity::Admin(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::StudentId;

    #[test]
    fn token_is_redacted_in_debug() {
        let token = AuthToken::new("secret-value");
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
        assert_eq!(token.as_str(), "secret-value");
    }

    #[test]
    fn identity_round_trips_through_json() {
        let identity = Identity::Student(Student {
            id: StudentId::new(9),
            last_name: "Rabe".into(),
            first_name: "Lova".into(),
            email: "lova@example.mg".into(),
            phone: None,
            auth_code: None,
            active: true,
            enrolled_at: None,
        });
        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains("\"role\":\"student\""));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
        assert_eq!(back.user_id(), 9);
        assert!(!back.is_admin());
    }
}
