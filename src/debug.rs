// Full-debug request tracing
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static FULL_DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn set_full_debug(enabled: bool) {
    FULL_DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_full_debug_enabled() -> bool {
    FULL_DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Milliseconds since the epoch, for trace lines
pub fn get_timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Trace one outbound call. Only the endpoint is printed, never the query,
/// since the query carries the signed-request tokens.
#[macro_export]
macro_rules! debug_api_call {
    ($method:expr, $endpoint:expr) => {
        if $crate::debug::is_full_debug_enabled() {
            let timestamp = $crate::debug::get_timestamp();
            $crate::o_error!("🌐 [{}] API: {} {}", timestamp, $method, $endpoint);
        }
    };
    ($method:expr, $endpoint:expr, $action:expr) => {
        if $crate::debug::is_full_debug_enabled() {
            let timestamp = $crate::debug::get_timestamp();
            $crate::o_error!("🌐 [{}] API: {} {} ({:?})", timestamp, $method, $endpoint, $action);
        }
    };
}

#[macro_export]
macro_rules! debug_info {
    ($($arg:tt)*) => {
        if $crate::debug::is_full_debug_enabled() {
            let timestamp = $crate::debug::get_timestamp();
            $crate::o_error!("ℹ️  [{}] DEBUG: {}", timestamp, format!($($arg)*));
        }
    };
}
