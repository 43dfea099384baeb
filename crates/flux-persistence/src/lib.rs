//! Journal persistence: an in-memory backend for tests and local runs,
//! and a Postgres backend (Diesel + r2d2) with schema parity between
//! the two.

pub mod journal;
pub mod memory;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use journal::Journal;
pub use memory::InMemoryJournal;
pub use pg::{ConnectionProvider, PgJournal, PgPool, PoolProvider};
pub use migrations::run_pending_migrations;
