//! The common contract every rule kind (flow, isolation, circuit-breaker,
//! system-adaptive) implements, so the registries in each module can share
//! validation and logging code.

use crate::Result;
use std::fmt::Debug;

/// Implemented by every concrete rule type. `resource_name` identifies which
/// resource's controller list the rule belongs to; `is_valid` gates whether
/// a loaded rule is installed or rejected, carrying the rejection reason as
/// an `Err` so rule managers can log it.
pub trait SentinelRule: Debug {
    fn resource_name(&self) -> String;

    /// Default accepts the rule; concrete rule types override this to
    /// reject out-of-range thresholds before they're installed.
    fn is_valid(&self) -> Result<()> {
        Ok(())
    }
}
