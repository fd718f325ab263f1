//! The process-wide registry of resource statistic nodes.
//!
//! The registry is copy-on-write: the map itself lives behind
//! `RwLock<Arc<HashMap<..>>>`. A lookup clones the `Arc` under a
//! (momentary) read lock and then searches the owned clone lock-free; an
//! insert clones the whole map, inserts into the clone, and swaps it in
//! under the write lock. Resource registration is rare relative to lookups
//! (every entry creation looks a resource up; registration happens once
//! per distinct resource name), so this trades a busier write path for a
//! lookup path that never contends with other readers.

use super::ResourceNode;
use crate::{
    base::{ResourceType, DEFAULT_MAX_RESOURCE_AMOUNT, TOTAL_IN_BOUND_RESOURCE_NAME},
    logging,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ResourceNodeMap = HashMap<String, Arc<ResourceNode>>;

lazy_static! {
    pub static ref INBOUND_NODE: Arc<ResourceNode> = Arc::new(ResourceNode::new(
        TOTAL_IN_BOUND_RESOURCE_NAME.into(),
        ResourceType::Common
    ));
    static ref RESOURCE_NODE_MAP: RwLock<Arc<ResourceNodeMap>> =
        RwLock::new(Arc::new(ResourceNodeMap::new()));
}

pub fn inbound_node() -> Arc<ResourceNode> {
    INBOUND_NODE.clone()
}

/// Returns every currently registered resource node. Snapshot semantics:
/// the list reflects the map as of the moment the `Arc` was cloned, and
/// won't observe insertions racing with this call.
pub fn resource_node_list() -> Vec<Arc<ResourceNode>> {
    let snapshot = RESOURCE_NODE_MAP.read().unwrap().clone();
    snapshot.values().cloned().collect()
}

pub fn get_resource_node(res_name: &String) -> Option<Arc<ResourceNode>> {
    let snapshot = RESOURCE_NODE_MAP.read().unwrap().clone();
    snapshot.get(res_name).cloned()
}

/// Looks up a resource node, creating and installing one if absent. The
/// double-checked pattern (read, then re-check after taking the write lock)
/// avoids clobbering a node a racing thread just installed.
pub fn get_or_create_resource_node(
    res_name: &String,
    resource_type: &ResourceType,
) -> Arc<ResourceNode> {
    if let Some(node) = get_resource_node(res_name) {
        return node;
    }
    let mut map = RESOURCE_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(res_name) {
        return node.clone();
    }
    if map.len() >= DEFAULT_MAX_RESOURCE_AMOUNT {
        logging::warn!(
            "[get_or_create_resource_node] Resource amount exceeds the threshold {}",
            DEFAULT_MAX_RESOURCE_AMOUNT
        )
    }
    let node = Arc::new(ResourceNode::new(res_name.clone(), *resource_type));
    let mut next = HashMap::clone(&map);
    next.insert(res_name.clone(), node.clone());
    *map = Arc::new(next);
    node
}

pub fn reset_resource_map() {
    *RESOURCE_NODE_MAP.write().unwrap() = Arc::new(ResourceNodeMap::new());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_then_reuse() {
        reset_resource_map();
        let name = "cow_test_resource".to_string();
        let n1 = get_or_create_resource_node(&name, &ResourceType::Common);
        let n2 = get_or_create_resource_node(&name, &ResourceType::Common);
        assert!(Arc::ptr_eq(&n1, &n2));
        assert!(get_resource_node(&name).is_some());
    }

    #[test]
    fn reset_clears_all() {
        let name = "cow_test_resource_2".to_string();
        get_or_create_resource_node(&name, &ResourceType::Common);
        reset_resource_map();
        assert!(get_resource_node(&name).is_none());
    }
}
