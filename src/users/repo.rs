use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::users::repo_types::{NewUser, UnknownPosition, User, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("username already taken")]
    UsernameTaken,

    #[error("corrupt user row: {0}")]
    Corrupt(#[from] UnknownPosition),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence operations the user handlers need.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// All users, or only those whose project is named `project_name`. Ordered by id.
    async fn list(&self, project_name: Option<&str>) -> Result<Vec<User>, RepoError>;

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;

    /// Insert a user; a taken username yields `RepoError::UsernameTaken`.
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;

    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> Result<(), RepoError>;
}

const USER_COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name, u.email, u.position, \
     u.phone, u.password_hash, u.last_login, u.date_joined, u.project_id";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn list(&self, project_name: Option<&str>) -> Result<Vec<User>, RepoError> {
        let rows = match project_name {
            Some(name) => {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users u \
                     JOIN projects p ON p.id = u.project_id \
                     WHERE p.name = $1 ORDER BY u.id"
                );
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(name)
                    .fetch_all(&self.db)
                    .await?
            }
            None => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.id");
                sqlx::query_as::<_, UserRow>(&sql)
                    .fetch_all(&self.db)
                    .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)"#)
                .bind(username)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users
                (username, first_name, last_name, email, position, phone, password_hash, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, first_name, last_name, email, position,
                      phone, password_hash, last_login, date_joined, project_id
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.position.as_str())
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.project_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::UsernameTaken,
            other => RepoError::Database(other),
        })?;
        Ok(User::try_from(row)?)
    }

    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query(r#"UPDATE users SET last_login = $1 WHERE id = $2"#)
            .bind(at)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
