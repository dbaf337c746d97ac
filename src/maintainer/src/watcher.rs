// Copyright 2025 RiverCDC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use parking_lot::RwLock;
use rivercdc_common::NodeId;

/// Address of one worker node, as registered with the cluster watcher.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NodeInfo {
    pub id: NodeId,
    pub advertise_addr: String,
}

/// Liveness snapshot fed by the external node manager's watch. The
/// maintainer only reads it; membership changes arrive through
/// [`crate::Controller::remove_node`].
#[derive(Default)]
pub struct NodeRegistry {
    alive: RwLock<HashMap<NodeId, NodeInfo>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_node(&self, info: NodeInfo) {
        self.alive.write().insert(info.id.clone(), info);
    }

    pub fn remove_node(&self, id: &NodeId) {
        self.alive.write().remove(id);
    }

    pub fn alive_nodes(&self) -> Vec<NodeId> {
        self.alive.read().keys().cloned().collect()
    }

    pub fn is_alive(&self, id: &NodeId) -> bool {
        self.alive.read().contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.alive.read().len()
    }
}
