//! # octofhir-launch-server
//!
//! HTTP front end for the SMART launch helper: serves the launch page,
//! keeps one launch session per browser cookie, and renders each
//! [`octofhir_launch::LaunchView`] as HTML.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;
pub mod templates;

pub use config::AppConfig;
pub use server::{AppState, LaunchServer, ServerBuilder, build_app, router};
