//! `circuitbreaker` implements the circuit breaker pattern, providing
//! stability and preventing cascading failures.
//!
//! Three strategies decide when a breaker trips:
//!
//!  1. `SlowRequestRatio`: the ratio of slow entries (response time over
//!     `max_allowed_rt_ms`) exceeds the threshold.
//!  2. `ErrorRatio`: the ratio of error entries exceeds the threshold.
//!  3. `ErrorCount`: the number of error entries exceeds the threshold.
//!
//! Each `Rule` is converted into a `CircuitBreakerTrait` object with its own
//! statistic structure. The breaker is a state machine with three states:
//! `Closed` (pass everything), `Open` (block everything until the retry
//! timeout elapses), and `HalfOpen` (probe a single entry to decide whether
//! to return to `Closed` or back to `Open`). `StateChangeListener` lets
//! callers observe transitions.

pub mod breaker;
pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod stat_slot;

pub use breaker::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use stat_slot::*;
