use serde::{Deserialize, Serialize};

/// Gruppo (chat room durevole) esposto sul wire.
/// Il creatore è sempre anche membro; l'elenco dei membri viaggia nei DTO
/// di `protocol::http`, non qui.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: String, // RFC3339 UTC
}
