/* Membership store: chi appartiene a quale gruppo, su tabelle groups e
    memberships. La membership cresce solo con una join esplicita e sparisce
    solo con la cancellazione del gruppo.
*/
use sqlx::{Row, SqlitePool};

use ateneo_core::models::Group;
use ateneo_core::protocol::http::MemberEntry;
use ateneo_core::utils::{new_id, now_timestamp};

use crate::error::ApiError;
use crate::message_log;

/// Crea un gruppo e iscrive il creatore come primo membro, atomicamente.
/// Fallisce con Conflict se il nome è già in uso.
pub async fn create_group(pool: &SqlitePool, name: &str, creator_id: &str) -> Result<Group, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidArgument("group name must not be empty".to_string()));
    }
    // controllo se il nome esiste già
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Err(ApiError::Conflict(format!("group name '{}' already exists", name)));
    }

    let group_id = new_id();
    let created_at = now_timestamp();

    // gruppo + membership del creatore in una transazione: il creatore
    // è membro dal primo istante di vita del gruppo
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO groups (group_id, name, creator_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(&group_id)
        .bind(name)
        .bind(creator_id)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO memberships (membership_id, group_id, user_id, joined_at) VALUES (?, ?, ?, ?)")
        .bind(new_id())
        .bind(&group_id)
        .bind(creator_id)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Group {
        group_id,
        name: name.to_string(),
        creator_id: creator_id.to_string(),
        created_at,
    })
}

/// Recupera un gruppo per id.
pub async fn get_group(pool: &SqlitePool, group_id: &str) -> Result<Group, ApiError> {
    let row = sqlx::query("SELECT group_id, name, creator_id, created_at FROM groups WHERE group_id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await?;
    let row = match row {
        Some(r) => r,
        None => return Err(ApiError::NotFound(format!("group {} not found", group_id))),
    };
    Ok(Group {
        group_id: row.try_get("group_id")?,
        name: row.try_get("name")?,
        creator_id: row.try_get("creator_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Elenca tutti i gruppi, dal più recente.
pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<Group>, ApiError> {
    let rows = sqlx::query("SELECT group_id, name, creator_id, created_at FROM groups ORDER BY created_at DESC, rowid DESC")
        .fetch_all(pool)
        .await?;
    let mut groups = Vec::with_capacity(rows.len());
    for row in rows {
        groups.push(Group {
            group_id: row.try_get("group_id")?,
            name: row.try_get("name")?,
            creator_id: row.try_get("creator_id")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok(groups)
}

/// Aggiunge un utente ad un gruppo. Idempotente: se è già membro è un
/// successo senza effetti. NotFound se il gruppo non esiste.
pub async fn add_member(pool: &SqlitePool, group_id: &str, user_id: &str) -> Result<(), ApiError> {
    // il gruppo deve esistere
    get_group(pool, group_id).await?;

    let already: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    if already > 0 {
        return Ok(());
    }

    sqlx::query("INSERT INTO memberships (membership_id, group_id, user_id, joined_at) VALUES (?, ?, ?, ?)")
        .bind(new_id())
        .bind(group_id)
        .bind(user_id)
        .bind(now_timestamp())
        .execute(pool)
        .await?;
    Ok(())
}

/// Verifica l'appartenenza di un utente ad un gruppo.
/// NotFound se il gruppo non esiste (membership su un gruppo fantasma non ha senso).
pub async fn is_member(pool: &SqlitePool, group_id: &str, user_id: &str) -> Result<bool, ApiError> {
    get_group(pool, group_id).await?;
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Elenca i membri di un gruppo in ordine di ingresso (creatore per primo).
pub async fn list_members(pool: &SqlitePool, group_id: &str) -> Result<Vec<MemberEntry>, ApiError> {
    let rows = sqlx::query(
        "SELECT u.user_id, u.username FROM memberships ms \
         JOIN users u ON u.user_id = ms.user_id \
         WHERE ms.group_id = ? ORDER BY ms.rowid ASC",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;
    let mut members = Vec::with_capacity(rows.len());
    for row in rows {
        members.push(MemberEntry {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
        });
    }
    Ok(members)
}

/// Cancella un gruppo. Solo il creatore può farlo; la cancellazione spazza
/// prima i messaggi, poi le membership, poi la riga del gruppo, tutto nella
/// stessa transazione: nessun messaggio può sopravvivere orfano.
pub async fn delete_group(pool: &SqlitePool, group_id: &str, requester_id: &str) -> Result<(), ApiError> {
    let group = get_group(pool, group_id).await?;
    if group.creator_id != requester_id {
        return Err(ApiError::Forbidden("only the creator can delete a group".to_string()));
    }

    let mut tx = pool.begin().await?;
    message_log::delete_by_group(&mut *tx, group_id).await?;
    sqlx::query("DELETE FROM memberships WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM groups WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
