// Global verbosity level shared by the output broker
use std::sync::atomic::{AtomicU8, Ordering};

static VERBOSITY_LEVEL: AtomicU8 = AtomicU8::new(0);

pub const MAX_VERBOSITY: u8 = 2;

pub fn set_verbosity_level(level: u8) {
    let level = level.min(MAX_VERBOSITY);
    VERBOSITY_LEVEL.store(level, Ordering::Relaxed);
    if level > 0 {
        println!("📢 Verbosity level: {} (0=summary, 1=operations, 2=full)", level);
    }
}

pub fn get_verbosity_level() -> u8 {
    VERBOSITY_LEVEL.load(Ordering::Relaxed)
}
