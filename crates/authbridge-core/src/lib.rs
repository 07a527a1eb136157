//! Core library for authbridge.
//!
//! Resolves the outcome of an OAuth sign-in callback: reads the identity
//! provider session, exchanges the provider token for application
//! credentials at the backend, stores them for later pages, and decides
//! where the user goes next.

pub mod api;
pub mod auth;
pub mod callback;
pub mod config;

pub use callback::{CallbackError, CallbackHandler, Destination, Navigator, Resolution, Routes};
pub use config::Config;
