//! Registration, login and bearer-token authentication.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    accounts::repo_types::Account,
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::{IssuedToken, JwtKeys},
        password,
    },
    db::DocumentStore,
    error::AppError,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_username(username: &str) -> Result<(), AppError> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(AppError::validation(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'",
        ))
    }
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::validation("Invalid email"))
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::validation("Password must not be empty"));
    }
    Ok(())
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub(crate) async fn hash_password(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(AppError::Internal)
}

async fn verify_password(plain: String, hash: Option<String>) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => password::verify_password(&plain, &hash),
        None => {
            password::verify_against_dummy(&plain);
            Ok(false)
        }
    })
    .await
    .map_err(anyhow::Error::from)?
    .map_err(AppError::Internal)
}

pub async fn register(store: &dyn DocumentStore, req: RegisterRequest) -> Result<Account, AppError> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);
    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&req.password)?;

    if Account::find_by_username(store, &username).await?.is_some() {
        warn!(%username, "username already registered");
        return Err(AppError::DuplicateUsername);
    }

    let hash = hash_password(req.password).await?;
    // The store's unique index still catches a concurrent registration.
    let account = Account::create(store, username, email, hash).await?;
    info!(user_id = %account.id, username = %account.username, "user registered");
    Ok(account)
}

/// Unknown username and wrong password are indistinguishable to the caller.
pub async fn login(
    store: &dyn DocumentStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<IssuedToken, AppError> {
    let username = req.username.trim();
    let account = Account::find_by_username(store, username).await?;
    let hash = account.as_ref().map(|a| a.password_hash.clone());

    let ok = verify_password(req.password, hash).await?;
    let account = match account {
        Some(a) if ok => a,
        _ => {
            warn!(%username, "login rejected");
            return Err(AppError::InvalidCredentials);
        }
    };

    let issued = keys.issue(account.id, keys.default_ttl())?;
    info!(user_id = %account.id, "user logged in");
    Ok(issued)
}

/// Verifies `token` and loads the account it was issued for.
pub async fn authenticate(
    store: &dyn DocumentStore,
    keys: &JwtKeys,
    token: &str,
) -> Result<Account, AppError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::from(e)
    })?;
    load_subject(store, claims.sub).await
}

async fn load_subject(store: &dyn DocumentStore, id: Uuid) -> Result<Account, AppError> {
    match Account::find_by_id(store, id).await? {
        Some(account) => Ok(account),
        None => {
            warn!(user_id = %id, "token subject no longer exists");
            Err(AppError::Unauthorized("Account no longer exists".into()))
        }
    }
}
