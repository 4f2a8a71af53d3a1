//! WebSocket chat transport.
//!
//! One actor per connection. Every outbound frame of a connection goes
//! through a single channel, so fragments reach the client in the order the
//! model produced them.

pub mod server;
pub mod session;

pub use server::websocket_route;
pub use session::ChatSocket;
