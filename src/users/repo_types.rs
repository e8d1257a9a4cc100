use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Job position a user can hold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Programmer,
    Designer,
    Manager,
    Tester,
    Analyst,
    Devops,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Programmer,
        Position::Designer,
        Position::Manager,
        Position::Tester,
        Position::Analyst,
        Position::Devops,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Programmer => "PROGRAMMER",
            Position::Designer => "DESIGNER",
            Position::Manager => "MANAGER",
            Position::Tester => "TESTER",
            Position::Analyst => "ANALYST",
            Position::Devops => "DEVOPS",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPosition(pub String);

impl fmt::Display for UnknownPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown position {:?}", self.0)
    }
}

impl std::error::Error for UnknownPosition {}

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_string()))
    }
}

/// Project a user may belong to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Raw `users` row; `position` is stored as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub last_login: Option<OffsetDateTime>,
    pub date_joined: OffsetDateTime,
    pub project_id: Option<i64>,
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
    pub last_login: Option<OffsetDateTime>,
    pub date_joined: OffsetDateTime,
    pub project_id: Option<i64>,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownPosition;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            username: r.username,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            position: r.position.parse()?,
            phone: r.phone,
            password_hash: r.password_hash,
            last_login: r.last_login,
            date_joined: r.date_joined,
            project_id: r.project_id,
        })
    }
}

/// Validated data for a user insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
    pub phone: Option<String>,
    pub password_hash: String,
    pub project_id: Option<i64>,
}
