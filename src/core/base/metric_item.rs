//! One line of a resource's metric log: the aggregated per-second counters
//! for a single resource, plus the textual encode/decode for that line.

use super::{ResourceType, TimePredicate};
use crate::utils::format_time_millis;
use crate::{Error, Result};
use std::fmt;

pub const METRIC_PART_SEPARATOR: &str = "|";
pub const METRIC_EMPTY_STRING_ERROR: &str = "invalid metric line: empty string";
pub const METRIC_INVALID_FORMAT_ERROR: &str = "invalid metric line: invalid format";

/// One resource's aggregated counters for a single wall-clock second.
#[derive(Debug, Clone, Default)]
pub struct MetricItem {
    pub(crate) resource: String,
    pub(crate) resource_type: ResourceType,
    pub(crate) timestamp: u64,
    pub(crate) pass_qps: u64,
    pub(crate) block_qps: u64,
    pub(crate) complete_qps: u64,
    pub(crate) error_qps: u64,
    pub(crate) avg_rt: u64,
    pub(crate) occupied_pass_qps: u64,
    pub(crate) concurrency: u32,
}

impl fmt::Display for MetricItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            format_time_millis(self.timestamp),
            self.resource.replace(METRIC_PART_SEPARATOR, "_"),
            self.pass_qps,
            self.block_qps,
            self.complete_qps,
            self.error_qps,
            self.avg_rt,
            self.occupied_pass_qps,
            self.concurrency,
            self.resource_type as u8
        )
    }
}

impl MetricItem {
    /// Parses one line produced by `Display`. The trailing three fields
    /// (`occupied_pass_qps`, `concurrency`, `resource_type`) were added after
    /// the format's original eight fields, so a short line is still accepted
    /// and the missing fields default.
    pub fn from_string(line: &str) -> Result<Self> {
        if line.is_empty() {
            return Err(Error::msg(METRIC_EMPTY_STRING_ERROR));
        }
        let fields: Vec<&str> = line.split(METRIC_PART_SEPARATOR).collect();
        if fields.len() < 8 {
            return Err(Error::msg(METRIC_INVALID_FORMAT_ERROR));
        }
        let mut item = MetricItem {
            timestamp: fields[0].parse()?,
            resource: fields[2].into(),
            pass_qps: fields[3].parse()?,
            block_qps: fields[4].parse()?,
            complete_qps: fields[5].parse()?,
            error_qps: fields[6].parse()?,
            avg_rt: fields[7].parse()?,
            ..Default::default()
        };
        if let Some(&occupied_pass_qps) = fields.get(8) {
            item.occupied_pass_qps = occupied_pass_qps.parse()?;
        }
        if let Some(&concurrency) = fields.get(9) {
            item.concurrency = concurrency.parse()?;
        }
        if let Some(&resource_type) = fields.get(10) {
            item.resource_type = resource_type.parse::<u8>()?.into();
        }
        Ok(item)
    }
}

/// Anything that can answer "give me your metrics for this time window",
/// e.g. a `ResourceNode` reporting what one resource did.
pub trait MetricItemRetriever: Send + Sync {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem>;
}
