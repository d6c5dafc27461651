//! # CrestSports API Library
//!
//! Backend for the CrestSports storefront: a product catalogue, guest
//! checkout with stock reservation, Razorpay payments, order tracking and a
//! single-admin back office, exposed as a versioned JSON API.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and extractors
//! - **SQLx**: Asynchronous database operations with SQLite
//! - **Tokio**: Async runtime for handlers and background tasks
//! - **Serde**: Serialization/deserialization for JSON APIs
//!
//! ## Core Components
//!
//! - [`config`]: Layered configuration (embedded defaults, files, environment)
//! - [`db`]: Pool construction and schema bootstrap
//! - [`error`]: Centralized error handling and the JSON error envelope
//! - [`metrics`]: Business and abuse counters
//! - [`middleware`]: Request ids, security headers, rate limiting, validation and the admin guard
//! - [`response`]: The JSON success envelope
//! - [`routes`]: HTTP API endpoint handlers and the router
//! - [`services`]: Catalogue, order, payment, email and auth logic
//! - [`state`]: Shared application state
//! - [`types`]: Domain models and request/response types

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
