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

//! Shared identifiers, catalog types and configuration used by every
//! rivercdc component.

pub mod catalog;
pub mod config;
pub mod filter;
pub mod id;
pub mod node;

pub use catalog::Table;
pub use config::{ReplicaConfig, SchedulerConfig};
pub use filter::TableFilter;
pub use id::{ChangefeedId, DispatcherId};
pub use node::NodeId;
