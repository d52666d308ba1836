//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, filesystem
//! access, HTTP downloads, archive extraction and file locking.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod fetcher;
pub mod fs;
pub mod history;
pub mod installer;
pub mod lock;
pub mod manifest;
pub mod releases;
pub mod supervisor;
