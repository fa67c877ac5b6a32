// Storage module - shared in-process state and the run log
pub mod claims;
pub mod position_cache;
pub mod roll_log;

pub use claims::*;
pub use position_cache::*;
pub use roll_log::*;
