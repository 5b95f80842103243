pub mod chat;
pub mod chat_sessions;
pub mod dto;
pub mod memories;
pub mod orchestration;
pub mod satisfaction;
pub mod temporal;
