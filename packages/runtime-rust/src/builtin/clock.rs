use std::time::{SystemTime, UNIX_EPOCH};

use crate::service::ManagedService;
use crate::traits::Clock;

/// [`Clock`] backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ManagedService for SystemClock {}

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}
