use uuid::Uuid;

/// Genera un nuovo id unico (UUIDv4) come stringa.
/// Usato dal server per user_id, group_id, message_id e token.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
