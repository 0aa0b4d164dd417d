//! Implied-volatility surface assembly.
//!
//! Per (path, step) state and per maturity, the smile is built once from
//! the forward `S·e^{rT}` and the anchor `max(√V, min_vol)`, then every delta
//! in the grid is resolved to a strike and evaluated on that smile.

mod assembler;
mod cache;
mod grid;
mod policy;

pub use assembler::{SurfaceAssembler, DEFAULT_MIN_VOL};
pub use cache::{SmileCache, SmileKey};
pub use grid::{CellFailure, SimulationTensor, SurfaceState, VolatilitySurface};
pub use policy::{FailurePolicy, SmileSource, SmileTemplate};
