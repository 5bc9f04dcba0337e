//! ateneo-core: tipi condivisi tra client e server (modelli, DTO HTTP, messaggi WS, errori).
//! Niente I/O: tutto ciò che passa sul wire vive qui.

pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;

// Re-export utili per ridurre i percorsi nel crate server
pub use error::Error;
pub use models::{group::Group, message::Message, user::User};
pub use protocol::http::{
    CreateGroupRequest, CreateGroupResponse, GroupDetails, GroupResponse, ListGroupsResponse,
    ListMessagesResponse, LoginRequest, LoginResponse, MemberEntry, MessageEntry,
    RegisterRequest, RegisterResponse, SendMessageRequest,
};
pub use protocol::ws::{Authenticate, JoinGroup, LeaveGroup, SendMessage, WsMessage};
pub use utils::{new_id, now_timestamp};
