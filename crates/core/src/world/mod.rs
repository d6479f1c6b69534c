mod clock;
mod economy;
mod faction;
mod simulator;
mod zone;

pub use clock::{WorldClock, REAL_SECONDS_PER_GAME_HOUR};
pub use economy::Economy;
pub use faction::FactionRelations;
pub use simulator::{AppliedEvent, TickResult, World};
pub use zone::{grid_coord, zone_id_for_position, Zone, ZoneIntent, ZoneManager, ZONE_SIZE};
