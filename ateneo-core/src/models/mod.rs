pub mod group;
pub mod message;
pub mod user;

// Re-export per comodità
pub use group::Group;
pub use message::Message;
pub use user::User;
