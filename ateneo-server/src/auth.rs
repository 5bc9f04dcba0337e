/* Verifica dell'identità: verify(token) -> User oppure fallimento.
    Il token è una stringa opaca emessa da register/login e salvata sulla
    riga utente; qui lo si consuma soltanto, senza assunzioni sul formato.
*/
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use sqlx::{Row, SqlitePool};

use ateneo_core::models::User;

use crate::error::ApiError;

/// Risolve un token opaco nell'utente che lo possiede.
pub async fn verify_token(pool: &SqlitePool, token: &str) -> Result<User, ApiError> {
    let row = sqlx::query("SELECT user_id, username, created_at FROM users WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    let row = match row {
        Some(r) => r,
        None => return Err(ApiError::Unauthenticated("invalid token".to_string())),
    };
    let user_id: String = row.try_get("user_id")?;
    let username: String = row.try_get("username")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(User { user_id, username, created_at })
}

/// Autentica una richiesta HTTP dall'header Authorization (bearer token).
/// Il prefisso "Bearer " è facoltativo: alcuni client mandano il token nudo.
pub async fn authenticate(pool: &SqlitePool, headers: &HeaderMap) -> Result<User, ApiError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("missing Authorization header".to_string()))?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated("empty bearer token".to_string()));
    }
    verify_token(pool, token).await
}
