use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::{jwt::JwtKeys, password},
    error::{ApiError, ApiResult},
    users::{
        dto::{AuthResponse, RegisterRequest, UserListItem},
        repo::UserRepo,
        repo_types::{NewUser, User},
        validation::{self, FieldErrors, USERNAME_TAKEN},
    },
};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Users, optionally restricted to one project. An empty name means no filter.
pub async fn list_users(repo: &dyn UserRepo, project_name: Option<&str>) -> ApiResult<Vec<User>> {
    let filter = project_name.filter(|name| !name.is_empty());
    Ok(repo.list(filter).await?)
}

/// Validates the payload and creates the user.
pub async fn register_user(repo: &dyn UserRepo, payload: &RegisterRequest) -> ApiResult<User> {
    let mut errors = FieldErrors::default();
    let checked = validation::check_fields(payload, &mut errors);

    if let Some(username) = checked.username.as_deref() {
        if repo.username_exists(username).await? {
            errors.push("username", USERNAME_TAKEN);
        }
    }
    if !errors.is_empty() {
        let fields: Vec<&str> = errors.fields().collect();
        warn!(?fields, "registration rejected");
        return Err(ApiError::Validation(errors));
    }

    let valid = checked.finish().map_err(ApiError::Validation)?;
    let password_hash = password::hash_password(&valid.password)?;

    let user = repo
        .create(NewUser {
            username: valid.username,
            first_name: valid.first_name,
            last_name: valid.last_name,
            email: validation::normalize_email(&valid.email),
            position: valid.position,
            phone: None,
            password_hash,
            project_id: None,
        })
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

fn issue_tokens(keys: &JwtKeys, user: &User) -> ApiResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: UserListItem::from(user),
    })
}

/// Checks credentials, stamps `last_login` and issues a token pair.
pub async fn login(
    repo: &dyn UserRepo,
    keys: &JwtKeys,
    username: &str,
    plain_password: &str,
) -> ApiResult<AuthResponse> {
    let Some(mut user) = repo.find_by_username(username).await? else {
        warn!(%username, "login unknown username");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !password::verify_password(plain_password, &user.password_hash)? {
        warn!(%username, user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    let now = OffsetDateTime::now_utc();
    repo.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);

    info!(user_id = user.id, "user logged in");
    issue_tokens(keys, &user)
}

/// Exchanges a refresh token for a new pair.
pub async fn refresh(repo: &dyn UserRepo, keys: &JwtKeys, token: &str) -> ApiResult<AuthResponse> {
    let claims = keys.verify_refresh(token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::Unauthorized("Token is invalid or expired".into())
    })?;

    let user = repo
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    issue_tokens(keys, &user)
}
