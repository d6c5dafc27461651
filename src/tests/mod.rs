//! Integration and unit tests for the CrestSports API.
//!
//! ## Test Modules
//!
//! - **support**: shared fixtures (test config, in-memory database, fake mailer and gateway)
//! - **api_tests**: router-level behaviour: envelopes, fallbacks, headers, rate limiting
//! - **auth_tests**: login, logout, session status and the admin guard
//! - **catalogue_tests**: categories and products over HTTP
//! - **orders_tests**: order placement, tracking, status changes and dashboard aggregates
//! - **payments_tests**: gateway order creation and signature verification
//! - **email_tests**: confirmation rendering and delivery
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema bootstrap and constraints
//! - **error_tests**: error envelope rendering
//! - **health_api_tests**: health, metrics and version endpoints
//!
//! Individual modules can be run with e.g. `cargo test orders_tests`.

pub mod support;

pub mod api_tests;
pub mod orders_tests;
