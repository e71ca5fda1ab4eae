use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{StudentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }

    /// Landing page of the role's dashboard.
    pub fn dashboard(self) -> &'static str {
        match self {
            Role::Student => "/student/dashboard",
            Role::Parent => "/parent/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }

    /// The role that owns a page path, if the path lives under a role area.
    pub fn for_path(path: &str) -> Option<Role> {
        let area = path.trim_start_matches('/').split('/').next()?;
        area.parse().ok()
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "student" => Ok(Role::Student),
            "parent" | "guardian" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole {
                text: input.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, snafu::Snafu)]
#[snafu(display("unknown role `{text}`"))]
pub struct UnknownRole {
    pub text: String,
}

/// The signed-in user as far as routing and outbound calls are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub role: Role,
}

impl SessionUser {
    pub fn student_id(&self) -> Option<StudentId> {
        (self.role == Role::Student).then(|| self.id.clone().into())
    }
}

/// Authentication context of one request.
///
/// Built once at the edge of the request and passed explicitly to every
/// outbound API call.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

impl Session {
    pub fn new(token: impl Into<String>, user: SessionUser) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// User profile returned by the remote API on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OtpVerification {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 4, max = 8))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PasswordReset {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8))]
    pub password: String,
}
