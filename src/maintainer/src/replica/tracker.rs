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

//! Generic per-id lifecycle tracking, embedded in the replication db by
//! composition. Every method assumes the db's lock is held; the index has
//! no locking of its own.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use rivercdc_common::{DispatcherId, NodeId};

use super::span::SpanReplication;

/// What the index needs from a tracked task.
pub trait Replication {
    type Id: Eq + Hash + Clone;

    fn replication_id(&self) -> Self::Id;
    fn assigned_node(&self) -> Option<NodeId>;
    fn assign_node(&self, node: Option<NodeId>);
}

impl Replication for Arc<SpanReplication> {
    type Id = DispatcherId;

    fn replication_id(&self) -> DispatcherId {
        self.id
    }

    fn assigned_node(&self) -> Option<NodeId> {
        self.node_id()
    }

    fn assign_node(&self, node: Option<NodeId>) {
        self.set_node_id(node);
    }
}

/// The three scheduling partitions plus a per-node view. A task is in
/// exactly one partition; its node assignment is non-empty iff it is in
/// `scheduling` or `replicating`.
pub struct LifecycleIndex<T: Replication> {
    absent: HashMap<T::Id, T>,
    scheduling: HashMap<T::Id, T>,
    replicating: HashMap<T::Id, T>,
    /// Tasks bound to each node, scheduling and replicating alike.
    node_tasks: HashMap<NodeId, HashMap<T::Id, T>>,
}

impl<T: Replication + Clone> LifecycleIndex<T> {
    pub fn new() -> Self {
        Self {
            absent: HashMap::new(),
            scheduling: HashMap::new(),
            replicating: HashMap::new(),
            node_tasks: HashMap::new(),
        }
    }

    pub fn add_absent(&mut self, task: T) {
        debug_assert!(task.assigned_node().is_none());
        self.absent.insert(task.replication_id(), task);
    }

    /// Installs a task that is already working on its node, e.g. reported by
    /// a bootstrap response.
    pub fn add_replicating(&mut self, task: T) {
        let node = task
            .assigned_node()
            .expect("replicating task must be bound to a node");
        self.node_tasks
            .entry(node)
            .or_default()
            .insert(task.replication_id(), task.clone());
        self.replicating.insert(task.replication_id(), task);
    }

    /// Unbinds the task and returns it to `absent`, whatever its state was.
    pub fn mark_absent(&mut self, task: &T) {
        let id = task.replication_id();
        self.scheduling.remove(&id);
        self.replicating.remove(&id);
        self.unbind_from_node(task);
        task.assign_node(None);
        self.absent.insert(id, task.clone());
    }

    pub fn mark_scheduling(&mut self, task: &T) {
        let id = task.replication_id();
        self.absent.remove(&id);
        self.replicating.remove(&id);
        self.scheduling.insert(id, task.clone());
    }

    pub fn mark_replicating(&mut self, task: &T) {
        let id = task.replication_id();
        self.absent.remove(&id);
        self.scheduling.remove(&id);
        self.replicating.insert(id, task.clone());
    }

    /// Moves the task's binding from `old` to `new` and marks it scheduling.
    pub fn bind_to_node(&mut self, old: Option<&NodeId>, new: NodeId, task: &T) {
        if old == Some(&new) {
            self.mark_scheduling(task);
            return;
        }
        if old.is_some() {
            self.unbind_from_node(task);
        }
        self.node_tasks
            .entry(new.clone())
            .or_default()
            .insert(task.replication_id(), task.clone());
        task.assign_node(Some(new));
        self.mark_scheduling(task);
    }

    /// Drops the task from every partition and node view. The task keeps its
    /// node assignment so the caller can still address the owning node.
    pub fn remove(&mut self, task: &T) {
        let id = task.replication_id();
        self.absent.remove(&id);
        self.scheduling.remove(&id);
        self.replicating.remove(&id);
        self.unbind_from_node(task);
    }

    fn unbind_from_node(&mut self, task: &T) {
        if let Some(node) = task.assigned_node() {
            if let Some(tasks) = self.node_tasks.get_mut(&node) {
                tasks.remove(&task.replication_id());
                if tasks.is_empty() {
                    self.node_tasks.remove(&node);
                }
            }
        }
    }

    pub fn absent(&self) -> impl Iterator<Item = &T> {
        self.absent.values()
    }

    pub fn scheduling(&self) -> impl Iterator<Item = &T> {
        self.scheduling.values()
    }

    pub fn replicating(&self) -> impl Iterator<Item = &T> {
        self.replicating.values()
    }

    pub fn absent_size(&self) -> usize {
        self.absent.len()
    }

    pub fn scheduling_size(&self) -> usize {
        self.scheduling.len()
    }

    pub fn replicating_size(&self) -> usize {
        self.replicating.len()
    }

    pub fn tasks_by_node(&self, node: &NodeId) -> impl Iterator<Item = &T> {
        self.node_tasks.get(node).into_iter().flat_map(|m| m.values())
    }

    pub fn task_size_by_node(&self, node: &NodeId) -> usize {
        self.node_tasks.get(node).map_or(0, |m| m.len())
    }

    /// Replicating tasks only, per node; the balance pass keys off this.
    pub fn replicating_size_by_node(&self, node: &NodeId) -> usize {
        self.node_tasks.get(node).map_or(0, |m| {
            m.values()
                .filter(|t| self.replicating.contains_key(&t.replication_id()))
                .count()
        })
    }
}

impl<T: Replication + Clone> Default for LifecycleIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
