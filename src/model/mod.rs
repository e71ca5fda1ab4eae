use derive_new::new;
use serde::{Deserialize, Serialize};

pub use access::*;
pub use progress::*;
pub use session::*;

mod access;
mod progress;
mod session;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, new)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id! {
    /// Identifier of a user account, as issued by the remote API.
    UserId
}

define_id! {
    /// Identifier of a student. Students are users, but access checks and
    /// progress are keyed by this narrower type.
    StudentId
}

define_id!(LectureId);
define_id!(SubjectId);

impl From<UserId> for StudentId {
    fn from(value: UserId) -> Self {
        Self(value.0)
    }
}
