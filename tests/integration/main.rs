//! Integration tests for the fetch orchestrator
//!
//! These tests use wiremock to stand in for the remote fetch service, the
//! browser rendering service and origin sites, and exercise the full
//! admission, fallback and escalation cycle end-to-end.

mod backend_tests;
mod common;
mod discovery_tests;
mod fetch_tests;
