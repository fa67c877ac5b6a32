// Operations module - crew rolling, fleet control, targeting and combat

pub mod combat;
pub mod crew_roller;
pub mod fleet;
pub mod hunter;
pub mod targeting;

pub use combat::*;
pub use crew_roller::*;
pub use fleet::*;
pub use hunter::*;
pub use targeting::*;
