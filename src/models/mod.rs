//! Data models shared by the backend and the client library.

pub mod chat;
pub mod envelope;
pub mod history;
pub mod patient;
pub mod records;
