//! Item and match stores with `SQLite` backends and in-memory doubles.

pub mod item_store;
pub mod match_store;
pub mod memory;

pub use item_store::{ItemStore, SqliteItemStore, StoreFuture};
pub use match_store::{MatchStore, SqliteMatchStore};
pub use memory::{MemoryItemStore, MemoryMatchStore};
