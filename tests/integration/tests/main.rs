//! End-to-End Integration Tests
//!
//! These tests run the CAS broker server on a free port against a fake CAS
//! server and drive it with a browser-like HTTP client.

mod common;
mod cas_login;
mod cas_logout;
