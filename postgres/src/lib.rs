//! `PostgreSQL` entity store for roster.
//!
//! This crate provides a PostgreSQL-based implementation of the `EntityStore` trait
//! from `roster-core`. Events and participants live in two tables; the id sets are
//! `UUID[]` columns.
//!
//! - Every association primitive is one guarded statement (or one row-locked
//!   transaction) on one row
//! - Bulk insert runs one `INSERT` per record, in order, and stops at the first failure
//! - Migrations are embedded with `sqlx::migrate!`
//!
//! # Example
//!
//! ```ignore
//! use roster_postgres::{PoolSettings, PostgresEntityStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresEntityStore::connect("postgres://localhost/roster", &PoolSettings::default()).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod entity_store;
mod rows;

pub use entity_store::{PoolSettings, PostgresEntityStore};
