//! REST client module for the application backend.
//!
//! This module provides the `ApiClient` used to trade an identity provider
//! access token for application-issued credentials, and the `TokenExchange`
//! trait the callback flow depends on.

pub mod client;
pub mod error;

pub use client::{ApiClient, ExchangeRequest, IssuedCredentials, TokenExchange};
pub use error::ApiError;
