//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod deploy;
pub mod error;
pub mod history;
pub mod layout;
pub mod manifest;
pub mod release;

pub use config::DeployConfig;
pub use error::{
    ConfigError, ErrorClass, FetchError, InputError, LockError, ProcessError, ReleaseError,
};
pub use layout::{AppLayout, AppName};
pub use release::{Release, ReleaseId, ReleaseStatus};

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
