//! Zoe conversation core HTTP surface.
//!
//! Wires the chat pipeline (C6) and every component crate's REST API behind
//! a single axum [`Router`](axum::Router), built once from a [`state::Services`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod http;
pub mod sessions;
pub mod state;

pub use auth::auth_middleware;
pub use error::ServerError;
pub use http::create_router;
pub use state::Services;
