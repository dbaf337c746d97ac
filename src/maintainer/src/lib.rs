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

//! The per-changefeed maintainer core: the control plane that partitions the
//! upstream key space into table spans, assigns each span to a dispatcher on
//! a worker node, tracks checkpoint progress, and coordinates blocking
//! events (DDLs, sync points) that must be globally ordered across all
//! dispatchers of a changefeed.
//!
//! The maintainer never reads rows itself. All of its state is derived from
//! bootstrap responses and the schema store, so a crashed maintainer is
//! rebuilt from scratch by the next bootstrap.

mod barrier;
mod controller;
pub mod error;
pub mod messaging;
pub mod operator;
pub mod range_checker;
pub mod replica;
pub mod scheduler;
pub mod schema;
pub mod split;
pub mod task;
pub mod tso;
pub mod watcher;

#[cfg(test)]
pub mod test_utils;

pub use barrier::{Barrier, BarrierEvent};
pub use controller::Controller;
pub use error::{MaintainerError, MaintainerResult};
