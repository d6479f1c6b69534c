//! Client-side receive pipeline: interpolation buffer and id remap table.
//! No rendering, no input prediction/reconciliation — both stay out of
//! this crate.

pub mod interpolation;
pub mod remap;

pub use interpolation::{InterpolatedEntity, InterpolationBuffer, EXTRAPOLATION_MS, INTERP_DELAY_MS};
pub use remap::RemapTable;
