//! Authentication module for provider sessions and issued credentials.
//!
//! This module provides:
//! - `IdentityProvider`: the "get current session" capability, with a
//!   file-backed and a static implementation
//! - `CredentialStore`: key-value storage for credentials issued by the
//!   backend, backed by the OS keychain or by memory

pub mod credentials;
pub mod session;

pub use credentials::{
    CredentialError, CredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    StoredCredentials,
};
pub use session::{FileSessionProvider, IdentityProvider, Session, SessionError, StaticSessionProvider};
