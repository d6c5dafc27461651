//! Business logic behind the route handlers.
//!
//! Catalogue and order modules are plain async functions over a `SqlitePool`;
//! the integrations (`auth`, `email`, `payments`) are structs built once from
//! configuration and shared through [`crate::state::AppState`].

pub mod auth;
pub mod categories;
pub mod email;
pub mod orders;
pub mod payments;
pub mod products;
