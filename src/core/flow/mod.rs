//! Flow control: shapes traffic against a threshold measured on QPS or concurrency.
//!
//! A `Controller` is built from a `Rule` and pairs two parts:
//!
//!  1. A `Calculator` derives the effective threshold from the rule's static configuration,
//!     optionally adjusted by live system metrics (`CalculateStrategy::Adaptive`) or a
//!     warm-up token bucket (`CalculateStrategy::WarmUp`).
//!  2. A `Checker` compares current traffic against that threshold and yields a `TokenResult`:
//!     `Reject` blocks immediately past the threshold, `Throttling` paces requests and queues
//!     them up to `max_queueing_time_ms` instead.

pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod standalone_stat_slot;
pub mod traffic_shaping;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use standalone_stat_slot::*;
pub use traffic_shaping::*;
