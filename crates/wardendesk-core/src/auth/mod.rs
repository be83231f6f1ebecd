//! Who is signed in, and with what token.
//!
//! - `Session`: the signed-in warden, persisted as JSON in the cache directory
//! - `CredentialStore`: the admin API bearer token, kept in the OS keychain

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
