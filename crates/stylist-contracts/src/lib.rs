pub mod chat;
pub mod closet;
pub mod conversation;
pub mod error;
pub mod events;
pub mod models;
pub mod session;
