pub const TOTAL_IN_BOUND_RESOURCE_NAME: &str = "__total_inbound_traffic__";

pub const DEFAULT_MAX_RESOURCE_AMOUNT: usize = 10000;

pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// default 10*1000/500 = 20
pub const DEFAULT_SAMPLE_COUNT_TOTAL: u32 = 20;
/// default 10s (total length)
pub const DEFAULT_INTERVAL_MS_TOTAL: u32 = 10000;

pub const DEFAULT_STATISTIC_MAX_RT: u64 = 60000;

pub const SLOT_INIT: usize = 8;
