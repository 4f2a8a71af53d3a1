//! Client library: guest session identity, cached transcript, chat view
//! state and the WebSocket connection used by terminal front ends.

pub mod connection;
pub mod session;
pub mod storage;
pub mod view;

pub use connection::{ChatConnection, ConnectionConfig, ConnectionError};
pub use session::SessionManager;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use view::{ChatView, ConnectionStatus, ViewEvent};
