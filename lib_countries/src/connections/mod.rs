//! # Connections Module
//!
//! Persistent connections to external services.

/// PostgreSQL connection pool and the database-backed country store.
pub mod db_postgres;

pub use db_postgres::PgCountryStore;
