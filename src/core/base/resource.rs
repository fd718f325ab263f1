//! Resource identity and traffic-direction wrappers.

use crate::utils::format_time_nanos_curr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of protected operation. Mirrors the upstream enum one-to-one;
/// `#[repr(u8)]` keeps the env-var/config wire representation stable.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceType {
    Common = 0,
    Web,
    RPC,
    APIGateway,
    DBSQL,
    Cache,
    MQ,
}

impl Default for ResourceType {
    fn default() -> ResourceType {
        ResourceType::Common
    }
}

impl From<u8> for ResourceType {
    fn from(num: u8) -> ResourceType {
        match num {
            1 => ResourceType::Web,
            2 => ResourceType::RPC,
            3 => ResourceType::APIGateway,
            4 => ResourceType::DBSQL,
            5 => ResourceType::Cache,
            6 => ResourceType::MQ,
            _ => ResourceType::Common,
        }
    }
}

/// `TrafficType` tags the direction of a call relative to the current
/// process: a resource's identity is the pair `(name, TrafficType)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficType {
    Outbound,
    Inbound,
}

impl Default for TrafficType {
    fn default() -> TrafficType {
        TrafficType::Outbound
    }
}

/// `ResourceWrapper` names the resource an entry is being created for.
#[derive(Debug, Clone)]
pub struct ResourceWrapper {
    name: String,
    resource_type: ResourceType,
    flow_type: TrafficType,
}

impl Default for ResourceWrapper {
    fn default() -> Self {
        ResourceWrapper {
            name: format_time_nanos_curr(),
            resource_type: ResourceType::default(),
            flow_type: TrafficType::default(),
        }
    }
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, flowType={:?}, resourceType={:?}}}",
            self.name, self.flow_type, self.resource_type
        )
    }
}

impl ResourceWrapper {
    pub fn new(name: String, resource_type: ResourceType, flow_type: TrafficType) -> Self {
        ResourceWrapper {
            name,
            resource_type,
            flow_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn traffic_type(&self) -> &TrafficType {
        &self.flow_type
    }
}
