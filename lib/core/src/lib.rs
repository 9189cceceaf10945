//! Core foundation for the cluster-login realm.
//!
//! This crate provides the shared `Result` type used throughout the realm.
//! Domain types live in `cluster-login-platform-access`; the platform API
//! client lives in `cluster-login-cluster-api`.

pub mod error;

pub use error::Result;
