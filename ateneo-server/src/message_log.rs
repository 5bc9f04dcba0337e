/* Message log: append-only, ordinato per gruppo.
    Questo modulo si fida del chiamante sull'autorizzazione (la policy sta
    nel gateway); qui c'è solo persistenza e lettura ordinata.
*/
use sqlx::{Row, SqlitePool};

use ateneo_core::models::Message;
use ateneo_core::protocol::http::MessageEntry;
use ateneo_core::utils::{new_id, now_timestamp};

use crate::error::ApiError;

/// Persiste un messaggio assegnando id e timestamp lato server.
/// InvalidArgument se il contenuto (dopo trim) è vuoto.
pub async fn append(
    pool: &SqlitePool,
    group_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<Message, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidArgument("message content must not be empty".to_string()));
    }

    let message_id = new_id();
    let created_at = now_timestamp();
    sqlx::query(
        "INSERT INTO messages (message_id, group_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message_id)
    .bind(group_id)
    .bind(sender_id)
    .bind(content)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(Message {
        message_id,
        group_id: group_id.to_string(),
        sender_id: sender_id.to_string(),
        content: content.to_string(),
        created_at,
    })
}

/// Messaggi di un gruppo in ordine di accettazione ascendente, con il nome
/// del mittente risolto. Il rowid spareggia i timestamp identici: coincide
/// con l'ordine di inserimento perché gli append dello stesso gruppo sono
/// serializzati dal gateway.
pub async fn list_by_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<MessageEntry>, ApiError> {
    let rows = sqlx::query(
        "SELECT m.message_id, m.group_id, m.sender_id, u.username AS sender_name, m.content, m.created_at \
         FROM messages m JOIN users u ON u.user_id = m.sender_id \
         WHERE m.group_id = ? ORDER BY m.created_at ASC, m.rowid ASC",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        messages.push(MessageEntry {
            message_id: row.try_get("message_id")?,
            group_id: row.try_get("group_id")?,
            sender_id: row.try_get("sender_id")?,
            sender_name: row.try_get("sender_name")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(messages)
}

/// Spazza tutti i messaggi di un gruppo. Idempotente; usata solo dalla
/// cancellazione a cascata del gruppo, dentro la sua transazione.
pub async fn delete_by_group<'e, E>(executor: E, group_id: &str) -> Result<u64, ApiError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM messages WHERE group_id = ?")
        .bind(group_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
