use std::time::Duration;

/// Value of the sentinel key that ends a run
pub const TEST_END_VALUE: &[u8] = b"true";
pub const DEFAULT_TEST_END_KEY: &str = "/prefix/testEnd";
pub const DEFAULT_DO_NOT_EXIT_KEY: &str = "/donotexit";

/// Watch count meaning "every prefix at this level"
pub const WATCH_ALL: &str = "n";

/// Rates are expressed in requests per hour
pub const RATE_PERIOD: Duration = Duration::from_secs(3600);

/// Upper bound for unbounded regex repetitions (`*`, `+`)
pub const REGEX_MAX_REPEAT: u32 = 32;

pub const DIGITS: &[u8] = b"0123456789";

/// Below this many clients every activity shares the whole pool
pub const MIN_CLIENTS_FOR_SPLIT: usize = 4;

pub const ENV_PREFIX: &str = "WORKLOAD";
