//! Pure domain logic for the sprite-sheet generation client.
//!
//! Everything in this crate is synchronous and free of I/O so it can be
//! shared by the cache, the gateway, the application services and the
//! CLI without pulling in a runtime.

pub mod error;
pub mod generation;
pub mod images;
pub mod pagination;
pub mod sprite_grid;
pub mod types;
