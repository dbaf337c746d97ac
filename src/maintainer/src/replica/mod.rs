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

//! In-memory index of every table span of one changefeed: lifecycle state
//! (absent / scheduling / replicating), secondary indices by table and
//! schema, and per-group checkers driving the scheduling policies.

mod db;
mod group;
mod span;
mod tracker;

pub use db::ReplicationDb;
pub use group::{GroupChecker, GroupCheckResult, GroupId};
pub use span::{ReplicationStatus, SpanReplication};
pub use tracker::{LifecycleIndex, Replication};
