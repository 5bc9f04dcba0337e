/* Test di integrazione del nucleo di messaggistica: membership, log dei
    messaggi, room registry e gateway, esercitati direttamente contro un
    database SQLite temporaneo come fa StartAndDatabase.rs.
*/
use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use ateneo_core::models::User;
use ateneo_core::protocol::ws::WsMessage;
use ateneo_core::utils::{new_id, now_timestamp};
use ateneo_server::error::ApiError;
use ateneo_server::{
    auth, connect_pool, gateway, membership, message_log, run_migrations, sqlite_url_for_path,
    AppState,
};

// Stato dell'applicazione su un DB temporaneo; il TempDir va tenuto in vita
// per tutta la durata del test.
async fn setup() -> Result<(TempDir, Arc<AppState>)> {
    let td = TempDir::new()?;
    let url = sqlite_url_for_path(&td.path().join("ateneo.db"))?;
    let pool = connect_pool(&url).await?;
    run_migrations(&pool).await?;
    Ok((td, Arc::new(AppState::new(pool))))
}

// Inserisce un utente direttamente in tabella e ne restituisce il modello
// wire più il token, come farebbe la register.
async fn insert_user(state: &AppState, username: &str) -> Result<(User, String)> {
    let user_id = new_id();
    let token = new_id();
    let created_at = now_timestamp();
    sqlx::query("INSERT INTO users (user_id, username, password_hash, token, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&user_id)
        .bind(username)
        .bind("x")
        .bind(&token)
        .bind(&created_at)
        .execute(&state.pool)
        .await?;
    Ok((User { user_id, username: username.to_string(), created_at }, token))
}

// Scarta tutto ciò che una connessione ha ricevuto e ritorna i soli eventi "message".
fn drain_messages(rx: &mut UnboundedReceiver<String>) -> Vec<ateneo_core::models::Message> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        if let Ok(WsMessage::Message(m)) = serde_json::from_str::<WsMessage>(&text) {
            out.push(m);
        }
    }
    out
}

/*
    Scenario: U crea il gruppo "alpha" ed è l'unico membro; V entra e i membri
    diventano {U, V} in ordine di ingresso; U manda "hi" dal percorso sincrono
    e la risposta è il messaggio persistito, visibile poi dalla lista.
*/
#[tokio::test]
async fn create_join_and_send_synchronously() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (v, _) = insert_user(&state, "v").await?;

    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    let members = membership::list_members(&state.pool, &group.group_id).await?;
    assert_eq!(members.len(), 1, "creator must be the sole member at creation");
    assert_eq!(members[0].user_id, u.user_id);

    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;
    let members = membership::list_members(&state.pool, &group.group_id).await?;
    assert_eq!(members.len(), 2);
    // ordine di ingresso: prima il creatore
    assert_eq!(members[0].user_id, u.user_id);
    assert_eq!(members[1].user_id, v.user_id);

    let message = gateway::accept_message(&state, &group.group_id, &u, "hi").await?;
    assert_eq!(message.sender_id, u.user_id);
    assert_eq!(message.content, "hi");

    let listed = message_log::list_by_group(&state.pool, &group.group_id).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].message_id, message.message_id);
    assert_eq!(listed[0].sender_name, "u");
    Ok(())
}

/*
    Scenario: V è iscritta alla room di "alpha" su una connessione; U invia
    dal percorso push e la connessione di V riceve l'evento di consegna senza
    aver chiesto nulla. Anche il mittente iscritto riceve la propria copia.
*/
#[tokio::test]
async fn push_send_is_delivered_to_room_members() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (v, _) = insert_user(&state, "v").await?;

    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;

    let (tx_u, mut rx_u) = unbounded_channel();
    let (tx_v, mut rx_v) = unbounded_channel();
    state.rooms.join(&group.group_id, "conn-u", tx_u);
    state.rooms.join(&group.group_id, "conn-v", tx_v);

    let sent = gateway::accept_message(&state, &group.group_id, &u, "hey").await?;

    let got_v = drain_messages(&mut rx_v);
    assert_eq!(got_v.len(), 1);
    assert_eq!(got_v[0].content, "hey");
    assert_eq!(got_v[0].message_id, sent.message_id);

    // conferma al mittente attraverso lo stesso canale degli altri
    let got_u = drain_messages(&mut rx_u);
    assert_eq!(got_u.len(), 1);
    assert_eq!(got_u[0].message_id, sent.message_id);
    Ok(())
}

/*
    Scenario: W non è membro di "alpha" e prova a mandare un messaggio.
    Il gateway risponde Forbidden, non persiste nulla e non consegna nulla.
*/
#[tokio::test]
async fn non_member_send_is_rejected_without_side_effects() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (w, _) = insert_user(&state, "w").await?;

    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;

    let (tx_u, mut rx_u) = unbounded_channel();
    state.rooms.join(&group.group_id, "conn-u", tx_u);

    let err = gateway::accept_message(&state, &group.group_id, &w, "intruso").await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)), "got {:?}", err);

    assert!(message_log::list_by_group(&state.pool, &group.group_id).await?.is_empty());
    assert!(drain_messages(&mut rx_u).is_empty(), "no broadcast for a rejected message");
    Ok(())
}

/*
    Scenario: il gruppo non esiste. Entrambe le verifiche del gateway devono
    distinguere il caso: NotFound, non Forbidden.
*/
#[tokio::test]
async fn send_to_missing_group_is_not_found() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;

    let err = gateway::accept_message(&state, "no-such-group", &u, "ciao").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "got {:?}", err);

    let err = membership::is_member(&state.pool, "no-such-group", &u.user_id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "got {:?}", err);
    Ok(())
}

/*
    Il contenuto vuoto (anche solo spazi) non è un messaggio: InvalidArgument
    e nessuna consegna.
*/
#[tokio::test]
async fn empty_content_is_invalid() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;

    let err = gateway::accept_message(&state, &group.group_id, &u, "   ").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)), "got {:?}", err);
    assert!(message_log::list_by_group(&state.pool, &group.group_id).await?.is_empty());
    Ok(())
}

/*
    Proprietà di ordinamento: per qualunque interleaving di mittenti sullo
    stesso gruppo, l'ordine di listByGroup coincide con l'ordine dei
    broadcast. Qui due mittenti spingono in parallelo e una connessione
    osservatrice registra l'ordine di consegna.
*/
#[tokio::test]
async fn per_group_order_matches_broadcast_order() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (v, _) = insert_user(&state, "v").await?;

    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;

    let (tx_obs, mut rx_obs) = unbounded_channel();
    state.rooms.join(&group.group_id, "conn-obs", tx_obs);

    let mut handles = Vec::new();
    for i in 0..5 {
        let state_u = state.clone();
        let state_v = state.clone();
        let gid = group.group_id.clone();
        let gid2 = group.group_id.clone();
        let u = u.clone();
        let v = v.clone();
        handles.push(tokio::spawn(async move {
            gateway::accept_message(&state_u, &gid, &u, &format!("u-{}", i)).await
        }));
        handles.push(tokio::spawn(async move {
            gateway::accept_message(&state_v, &gid2, &v, &format!("v-{}", i)).await
        }));
    }
    for h in handles {
        h.await.expect("task join").expect("message accepted");
    }

    let broadcast_ids: Vec<String> =
        drain_messages(&mut rx_obs).into_iter().map(|m| m.message_id).collect();
    let listed_ids: Vec<String> = message_log::list_by_group(&state.pool, &group.group_id)
        .await?
        .into_iter()
        .map(|m| m.message_id)
        .collect();

    assert_eq!(listed_ids.len(), 10);
    assert_eq!(broadcast_ids, listed_ids, "log order must equal broadcast order");
    Ok(())
}

/*
    La join della room è idempotente: iscriversi due volte lascia una sola
    iscrizione e una sola consegna per broadcast.
*/
#[tokio::test]
async fn room_join_is_idempotent() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;

    let (tx, mut rx) = unbounded_channel();
    state.rooms.join(&group.group_id, "conn-u", tx.clone());
    state.rooms.join(&group.group_id, "conn-u", tx);
    assert_eq!(state.rooms.room_size(&group.group_id), 1);

    gateway::accept_message(&state, &group.group_id, &u, "una volta sola").await?;
    assert_eq!(drain_messages(&mut rx).len(), 1);
    Ok(())
}

/*
    Anche la membership persistita è idempotente: la seconda join non
    duplica il membro e non è un errore.
*/
#[tokio::test]
async fn membership_join_is_idempotent() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (v, _) = insert_user(&state, "v").await?;
    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;

    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;
    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;
    assert_eq!(membership::list_members(&state.pool, &group.group_id).await?.len(), 2);
    Ok(())
}

/*
    La disconnessione toglie la connessione da ogni room in cui era entrata:
    i broadcast successivi non la raggiungono più e le room vuote spariscono.
*/
#[tokio::test]
async fn disconnect_removes_connection_from_every_room() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let ga = membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    let gb = membership::create_group(&state.pool, "beta", &u.user_id).await?;

    let (tx, mut rx) = unbounded_channel();
    state.rooms.join(&ga.group_id, "conn-u", tx.clone());
    state.rooms.join(&gb.group_id, "conn-u", tx);
    assert_eq!(state.rooms.room_size(&ga.group_id), 1);
    assert_eq!(state.rooms.room_size(&gb.group_id), 1);

    state.rooms.on_disconnect("conn-u");
    assert_eq!(state.rooms.room_size(&ga.group_id), 0);
    assert_eq!(state.rooms.room_size(&gb.group_id), 0);

    gateway::accept_message(&state, &ga.group_id, &u, "a nessuno").await?;
    assert!(drain_messages(&mut rx).is_empty());

    // leave su una room mai vista: nessun effetto, nessun panico
    state.rooms.leave(&ga.group_id, "conn-mai-vista");
    Ok(())
}

/*
    Scenario: solo il creatore può cancellare il gruppo; la cancellazione
    porta via tutti i messaggi e il gruppo stesso non si trova più.
*/
#[tokio::test]
async fn delete_group_cascades_and_is_creator_only() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;
    let (v, _) = insert_user(&state, "v").await?;

    let group = membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    membership::add_member(&state.pool, &group.group_id, &v.user_id).await?;
    gateway::accept_message(&state, &group.group_id, &u, "primo").await?;
    gateway::accept_message(&state, &group.group_id, &v, "secondo").await?;

    // V non è il creatore
    let err = membership::delete_group(&state.pool, &group.group_id, &v.user_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)), "got {:?}", err);

    membership::delete_group(&state.pool, &group.group_id, &u.user_id).await?;

    let err = membership::get_group(&state.pool, &group.group_id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "got {:?}", err);

    // nessun messaggio orfano in tabella
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE group_id = ?")
        .bind(&group.group_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orphans, 0);
    Ok(())
}

/*
    Il nome del gruppo è unico: la seconda creazione con lo stesso nome è Conflict.
*/
#[tokio::test]
async fn duplicate_group_name_is_conflict() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, _) = insert_user(&state, "u").await?;

    membership::create_group(&state.pool, "alpha", &u.user_id).await?;
    let err = membership::create_group(&state.pool, "alpha", &u.user_id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {:?}", err);
    Ok(())
}

/*
    Il verificatore d'identità: token valido -> utente, token sconosciuto ->
    Unauthenticated. L'header Authorization accetta il prefisso "Bearer ".
*/
#[tokio::test]
async fn token_verification_and_bearer_header() -> Result<()> {
    let (_td, state) = setup().await?;
    let (u, token) = insert_user(&state, "u").await?;

    let verified = auth::verify_token(&state.pool, &token).await?;
    assert_eq!(verified.user_id, u.user_id);

    let err = auth::verify_token(&state.pool, "token-inventato").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated(_)), "got {:?}", err);

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        axum::http::header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    let via_header = auth::authenticate(&state.pool, &headers).await?;
    assert_eq!(via_header.user_id, u.user_id);

    // header assente
    let err = auth::authenticate(&state.pool, &axum::http::HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated(_)), "got {:?}", err);
    Ok(())
}
