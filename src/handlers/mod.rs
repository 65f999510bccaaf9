// src/handlers/mod.rs
mod auth;
mod diary;
mod listing;
mod notes;
mod reminders;
mod search;
mod tags;
mod todos;
mod transfer;

pub use auth::*;
pub use diary::*;
pub use listing::*;
pub use notes::*;
pub use reminders::*;
pub use search::*;
pub use tags::*;
pub use todos::*;
pub use transfer::*;
