//! This file is the root of the `vtile` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`kernels`, `codec`,
//!     `vector`, `tile`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types and functions that make up the public
//!     entry points: `encode_tile`, `decode_tile` and `decode_vectorized`.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod codec;
pub mod config;
pub mod error;
pub mod fsst;
pub mod kernels;
pub mod metadata;
pub mod schema;
pub mod tile;
pub mod vector;

pub mod traits;
mod utils;

//==================================================================================
// 2. Public Entry Points
//==================================================================================
pub use config::VtileConfig;
pub use error::VtileError;
pub use observability::enable_verbose_logging;
pub use schema::TilesetSchema;
pub use tile::{decode_tile, decode_vectorized, encode_tile, FeatureTable, Tile};
