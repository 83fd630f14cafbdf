pub mod api;
pub mod chat;

pub use chat::{ ChatEntry, Conversation, Message, Role };
