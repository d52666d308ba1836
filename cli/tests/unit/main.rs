//! Unit tests for keel
//!
//! These tests drive the orchestrator against a temporary root with faked
//! artifact download, dependency installation and process supervision.

mod deploy_service;
mod fakes;
mod property_tests;
mod rollback_service;
mod setup_service;
mod status_service;
