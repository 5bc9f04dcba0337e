use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use ateneo_core::models::{Message, User};
use ateneo_core::protocol::http::{
    CreateGroupRequest, CreateGroupResponse, GroupDetails, GroupResponse, ListGroupsResponse,
    ListMessagesResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    SendMessageRequest,
};
use ateneo_core::utils::{new_id, now_timestamp};

use crate::error::ApiError;
use crate::{auth, gateway, membership, message_log, AppState};

/// Handler per POST /api/register
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    // controllo se lo username esiste già
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&req.username)
        .fetch_one(&state.pool)
        .await?;
    if existing > 0 {
        return Err(ApiError::Conflict("username already exists".to_string()));
    }

    // genera id utente e token
    let user_id = new_id();
    let token = new_id();
    let password_hash = hash_password(&req.password);
    let created_at = now_timestamp();

    sqlx::query("INSERT INTO users (user_id, username, password_hash, token, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&user_id)
        .bind(&req.username)
        .bind(&password_hash)
        .bind(&token)
        .bind(&created_at)
        .execute(&state.pool)
        .await?;

    let user = User { user_id, username: req.username.clone(), created_at };
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

/// Handler per POST /api/login
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let row = sqlx::query("SELECT user_id, password_hash, created_at FROM users WHERE username = ?")
        .bind(&req.username)
        .fetch_optional(&state.pool)
        .await?;
    let row = match row {
        Some(r) => r,
        None => return Err(ApiError::NotFound("user not found".to_string())),
    };
    let user_id: String = row.try_get("user_id")?;
    let stored_hash: String = row.try_get("password_hash")?;
    let created_at: String = row.try_get("created_at")?;

    // confronto dell'hash calcolato con quello salvato
    if hash_password(&req.password) != stored_hash {
        return Err(ApiError::Unauthenticated("invalid credentials".to_string()));
    }

    // genera token nuovo e aggiorna la riga utente
    let token = new_id();
    sqlx::query("UPDATE users SET token = ? WHERE user_id = ?")
        .bind(&token)
        .bind(&user_id)
        .execute(&state.pool)
        .await?;

    let user = User { user_id, username: req.username.clone(), created_at };
    Ok(Json(LoginResponse { token, user }))
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Gruppo + membri con i nomi risolti, forma usata da più risposte.
async fn group_details(pool: &SqlitePool, group_id: &str) -> Result<GroupDetails, ApiError> {
    let group = membership::get_group(pool, group_id).await?;
    let members = membership::list_members(pool, group_id).await?;
    Ok(GroupDetails {
        group_id: group.group_id,
        name: group.name,
        creator_id: group.creator_id,
        created_at: group.created_at,
        members,
    })
}

/// Handler per GET /api/groups
pub async fn list_groups(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListGroupsResponse>, ApiError> {
    auth::authenticate(&state.pool, &headers).await?;
    let groups = membership::list_groups(&state.pool).await?;
    Ok(Json(ListGroupsResponse { groups }))
}

/// Handler per POST /api/groups
pub async fn create_group(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<CreateGroupResponse>), ApiError> {
    let user = auth::authenticate(&state.pool, &headers).await?;
    let group = membership::create_group(&state.pool, &req.name, &user.user_id).await?;
    let group = group_details(&state.pool, &group.group_id).await?;
    Ok((StatusCode::CREATED, Json(CreateGroupResponse { group })))
}

/// Handler per GET /api/groups/:group_id
pub async fn get_group(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<GroupResponse>, ApiError> {
    auth::authenticate(&state.pool, &headers).await?;
    let group = group_details(&state.pool, &group_id).await?;
    Ok(Json(GroupResponse { group }))
}

/// Handler per POST /api/groups/:group_id/join
/// Idempotente: chi è già membro riceve comunque il gruppo aggiornato.
pub async fn join_group(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<GroupResponse>, ApiError> {
    let user = auth::authenticate(&state.pool, &headers).await?;
    membership::add_member(&state.pool, &group_id, &user.user_id).await?;
    let group = group_details(&state.pool, &group_id).await?;
    Ok(Json(GroupResponse { group }))
}

/// Handler per DELETE /api/groups/:group_id
/// Solo il creatore; la cancellazione porta via anche tutti i messaggi.
pub async fn delete_group(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = auth::authenticate(&state.pool, &headers).await?;
    membership::delete_group(&state.pool, &group_id, &user.user_id).await?;
    // il sequencer del gruppo non serve più
    state.sequencers.remove(&group_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler per GET /api/groups/:group_id/messages
/// NotFound se il gruppo non esiste (anche dopo una cancellazione).
pub async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    auth::authenticate(&state.pool, &headers).await?;
    membership::get_group(&state.pool, &group_id).await?;
    let messages = message_log::list_by_group(&state.pool, &group_id).await?;
    Ok(Json(ListMessagesResponse { messages }))
}

/// Handler per POST /api/groups/:group_id/messages — adattatore sincrono
/// del gateway: ogni errore della pipeline arriva al chiamante con il suo
/// status distinto.
pub async fn post_message(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let user = auth::authenticate(&state.pool, &headers).await?;
    let message = gateway::accept_message(&state, &group_id, &user, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
