//! Integration tests for keel
//!
//! These tests spawn the actual binary against a temporary root. None of
//! them reach the network or a process supervisor.
