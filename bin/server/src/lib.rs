//! cluster-login web server.
//!
//! This crate wires the OAuth security realm, platform API client, and
//! matrix synchronization into an Axum server exposing the login flow.

pub mod auth;
pub mod config;
