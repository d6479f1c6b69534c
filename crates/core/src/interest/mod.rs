//! Interest-filtered broadcast: per-session AOI tracking with a zone-grid
//! pre-filter.

mod manager;
mod zone_grid;

pub use manager::{InterestManager, SessionDelta, REASON_OUT_OF_RANGE};
pub use zone_grid::ZoneGrid;
