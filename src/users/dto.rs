use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use time::{macros::format_description, OffsetDateTime, UtcOffset};

use crate::users::repo_types::{Position, User};

/// `last_login` wire format: UTC, whole seconds, `Z` suffix.
pub fn format_last_login(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
}

fn serialize_last_login<S: Serializer>(
    value: &Option<OffsetDateTime>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(dt) => {
            let text = format_last_login(*dt).map_err(serde::ser::Error::custom)?;
            s.serialize_str(&text)
        }
        None => s.serialize_none(),
    }
}

/// Query string of `GET /users/`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub project_name: Option<String>,
}

/// One entry of the user list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserListItem {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
    pub phone: Option<String>,
    #[serde(serialize_with = "serialize_last_login")]
    pub last_login: Option<OffsetDateTime>,
}

impl From<&User> for UserListItem {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            email: u.email.clone(),
            position: u.position,
            phone: u.phone.clone(),
            last_login: u.last_login,
        }
    }
}

/// Registration payload. Fields stay raw JSON so that missing or
/// mistyped fields are reported per field by validation.
#[derive(Debug, Default)]
pub struct RegisterRequest {
    pub username: Option<Value>,
    pub first_name: Option<Value>,
    pub last_name: Option<Value>,
    pub email: Option<Value>,
    pub position: Option<Value>,
    pub password: Option<Value>,
    pub re_password: Option<Value>,
}

impl RegisterRequest {
    /// Picks the known fields out of a JSON body. Non-object bodies and
    /// `null` values count as missing.
    pub fn from_body(body: Value) -> Self {
        let Value::Object(mut map) = body else {
            return Self::default();
        };
        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_null());
        Self {
            username: take("username"),
            first_name: take("first_name"),
            last_name: take("last_name"),
            email: take("email"),
            position: take("position"),
            password: take("password"),
            re_password: take("re_password"),
        }
    }
}

/// Body returned after a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
}

impl From<User> for RegisteredUser {
    fn from(u: User) -> Self {
        Self {
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            position: u.position,
        }
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserListItem,
}
