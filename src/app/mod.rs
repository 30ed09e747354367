//! HTTP surface: routing, sessions, page rendering.

pub mod handlers;
pub mod respond;
pub mod server;
pub mod session;
pub mod views;

pub use server::{build_router, serve, AppState};
