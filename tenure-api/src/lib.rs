//! # Tenure API Server Library
//!
//! Router, configuration and handlers of the Tenure HTTP API. The binary in
//! `main.rs` wires these to a database pool and a listener; integration
//! tests drive [`app::build_router`] directly.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Environment configuration
//! - `error`: Error type and HTTP response mapping
//! - `middleware`: Response security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
