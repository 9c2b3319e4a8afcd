//! End-to-End Integration Tests
//!
//! These tests run the attribute query client against an in-process
//! attribute authority served by axum on a loopback port.

mod attribute_query;
mod common;
mod validation;
