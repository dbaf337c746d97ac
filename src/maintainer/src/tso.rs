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

use async_trait::async_trait;

/// Client of the timestamp oracle. Every span replication carries a shared
/// handle so dispatcher-side pulls can be stamped consistently.
#[async_trait]
pub trait TsoClient: Send + Sync {
    /// Returns a globally monotonic (physical, logical) pair.
    async fn get_ts(&self) -> anyhow::Result<(i64, i64)>;
}
