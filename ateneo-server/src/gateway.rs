/* Ingestion gateway: l'unica sequenza autorizza -> persisti -> broadcast.
    Sia il percorso sincrono (POST messages) sia quello push (evento WS
    sendMessage) passano da qui: un solo punto di verità, niente deriva tra
    i due adattatori.
*/
use std::sync::Arc;
use tokio::sync::Mutex;

use ateneo_core::models::{Message, User};
use ateneo_core::protocol::ws::WsMessage;

use crate::error::ApiError;
use crate::membership;
use crate::message_log;
use crate::AppState;

/// Accetta un messaggio per un gruppo: verifica la membership del mittente,
/// lo persiste e lo consegna alla room, in quest'ordine e sotto il mutex
/// del gruppo. Così l'ordine del log coincide con l'ordine dei broadcast
/// per qualunque interleaving di chiamanti, mentre gruppi diversi non si
/// contendono nulla. Se la persistenza fallisce il broadcast non avviene.
pub async fn accept_message(
    state: &AppState,
    group_id: &str,
    sender: &User,
    content: &str,
) -> Result<Message, ApiError> {
    // un mutex per gruppo; il guard della DashMap va rilasciato prima
    // dell'await sul lock
    let sequencer: Arc<Mutex<()>> = {
        let entry = state.sequencers.entry(group_id.to_string()).or_default();
        entry.value().clone()
    };
    let _guard = sequencer.lock().await;

    // autorizzazione: NotFound se il gruppo non esiste, Forbidden se il
    // mittente non è membro
    if !membership::is_member(&state.pool, group_id, &sender.user_id).await? {
        return Err(ApiError::Forbidden(format!(
            "user {} is not a member of group {}",
            sender.user_id, group_id
        )));
    }

    let message = message_log::append(&state.pool, group_id, &sender.user_id, content).await?;
    let delivered = state.rooms.broadcast(group_id, &WsMessage::Message(message.clone()));
    tracing::debug!(
        "message {} accepted for group {} ({} deliveries)",
        message.message_id,
        group_id,
        delivered
    );
    Ok(message)
}
