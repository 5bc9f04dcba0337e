pub mod http;
pub mod ws;

// Re-export comodi
pub use http::{
    CreateGroupRequest, CreateGroupResponse, GroupDetails, GroupResponse, ListGroupsResponse,
    ListMessagesResponse, LoginRequest, LoginResponse, MemberEntry, MessageEntry,
    RegisterRequest, RegisterResponse, SendMessageRequest,
};
pub use ws::{Authenticate, JoinGroup, LeaveGroup, SendMessage, WsMessage};
