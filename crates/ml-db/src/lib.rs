//! # ml-db
//!
//! Database layer for Medialib RS.
//!
//! This crate provides PostgreSQL access using SQLx:
//!
//! - Connection pool management and migrations
//! - Repository pattern for CRUD operations
//! - A `MediaStore` over the `media` table
//!
//! ## Example
//!
//! ```ignore
//! use ml_db::{Database, DatabaseConfig, PgMediaStore};
//!
//! let db = Database::connect(&DatabaseConfig::with_url(url)).await?;
//! db.migrate().await?;
//!
//! let store = PgMediaStore::new(db.pool().clone());
//! ```

pub mod media;
pub mod pool;
pub mod repository;

// Re-exports
pub use media::{CreateMediaDto, MediaRepository, MediaRow, PgMediaStore, UpdateMediaDto};
pub use pool::{Database, DatabaseConfig};
pub use repository::{Repository, RepositoryError, RepositoryResult};
