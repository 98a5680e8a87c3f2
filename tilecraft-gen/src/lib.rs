//! Tile world generation from declarative specs
//!
//! Architecture:
//! 1. `spec` - Document model; compiles layers, shapes and predicates from JSON
//! 2. `validate` - Tile palette validation, glyph sanitization, hard limits
//! 3. `layers` - Samples named layers with per-run caches and cycle detection
//! 4. `predicate` / `shape` - Per-cell conditions and geometric containment
//! 5. `ops` - Compiles the op list with tile references resolved
//! 6. `builder` - Runs ops over the grid and produces the output document
//!
//! Also includes:
//! - `rng` - String-seeded PRNG and value noise

mod error;
mod rng;
mod shape;
pub mod spec;
pub mod validate;
pub mod layers;
pub mod predicate;
pub mod ops;
pub mod builder;

pub use error::{Error, Result};
pub use rng::{fnv1a, hash_unit, Rng, ValueNoise};
pub use spec::{
    WorldSpec, WorldDims, TileDocs, TileSet, BackgroundTile, ForegroundTile,
    WorldOutput, Area, Cell, LayerDef, Shape, Predicate,
};
pub use validate::{GlyphWhitelist, TileIndex, ValidatedTiles, MAX_OPS};
pub use layers::{LayerSampler, MAX_LAYERS};
pub use predicate::EvalContext;
pub use ops::Op;
pub use builder::{generate, generate_with_glyphs, plan, Plan, Grid, WorldBuilder, ScatterStats};
