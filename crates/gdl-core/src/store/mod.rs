//! Persistent job/episode state store (SQLite via sqlx).
//!
//! Jobs carry status, stage, and coarse progress; episodes carry the
//! per-unit status inferred from worker output. All mutations are single
//! row-level UPDATEs so concurrent writers never need a transaction.

pub mod types;
pub mod db;
pub mod jobs;
pub mod episodes;

pub use types::*;
pub use db::*;
