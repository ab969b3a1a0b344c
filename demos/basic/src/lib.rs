//! Space ships over EasyCells: every peer instantiates ships through a
//! static RPC, ships carry a replicated life total and transform, and the
//! server replays existing ships to late joiners.

mod fleet;
mod models;

pub use fleet::{
    new_ship_identifier, register_fleet, transform_identifier, Fleet, SharedFleet, Ship,
    ShipArgs, ShipState, DESTROY, INSTANTIATE, LATE_JOIN_DELAY, TAKE_DAMAGE,
};
pub use models::{ship_config, ShipConfig, MODELS, WORLD_SIZE};
