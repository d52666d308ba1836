//! Command implementations

pub mod deploy;
pub mod rollback;
pub mod setup;
pub mod status;
