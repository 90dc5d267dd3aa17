pub mod api;
mod auth;
pub mod config;
mod qr;

pub use api::{AppState, GatewayError, router, serve};
pub use config::GatewayConfig;
