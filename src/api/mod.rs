//! REST API for CareAgents
//!
//! Chat, record-analysis, session and patient endpoints.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::configure;
