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

mod count;
mod span;

pub use count::TableCountChecker;
pub use span::TableSpanRangeChecker;

/// Tracks whether a set of per-dispatcher key sub-ranges fully covers a
/// target range. Single-writer: each barrier event owns its checker.
pub trait RangeChecker: Send {
    fn add_sub_range(&mut self, table_id: i64, start_key: &[u8], end_key: &[u8]);
    fn is_fully_covered(&self) -> bool;
    fn reset(&mut self);
    /// Human-readable coverage summary for diagnostics.
    fn detail(&self) -> String;
}
