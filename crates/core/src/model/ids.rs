use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! portal_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

portal_id!(
    /// Identifier of a quiz, exam, test or exercise.
    QuizId
);
portal_id!(
    /// Identifier of a question inside a quiz.
    QuestionId
);
portal_id!(
    /// Identifier of an enrolled student.
    StudentId
);
portal_id!(PaymentId);
portal_id!(DocumentId);
portal_id!(NotificationId);
portal_id!(ResultId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_formats() {
        let id = QuizId::new(7);
        assert_eq!(format!("{id:?}"), "QuizId(7)");
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&QuestionId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: QuestionId = serde_json::from_str("42").unwrap();
        assert_eq!(back, QuestionId::new(42));
    }
}
