// Copyright 2024 tison <wander4096@gmail.com>
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

//! [`MetadataSnapshot`] is the fully-formed, immutable view of the cluster
//! that [`crate::cache::MetadataCache`] publishes on every update. Once
//! constructed it is never mutated; a new snapshot always replaces the old
//! one wholesale.

use std::collections::HashMap;
use std::collections::HashSet;

use uuid::Uuid;

use crate::model::AliveNodes;
use crate::model::Broker;
use crate::model::PartitionState;

/// `topic -> (partitionIndex -> PartitionState)`.
pub type PartitionStates = HashMap<String, HashMap<i32, PartitionState>>;

#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    pub partition_states: PartitionStates,
    pub topic_ids: HashMap<String, Uuid>,
    pub topic_names: HashMap<Uuid, String>,
    pub controller_id: Option<i32>,
    pub alive_brokers: HashMap<i32, Broker>,
    pub alive_nodes: AliveNodes,
}

impl MetadataSnapshot {
    /// Builds a snapshot from `topic_ids`, deriving the inverse `topic_names`
    /// map so callers can never let the two drift apart.
    pub fn new(
        partition_states: PartitionStates,
        topic_ids: HashMap<String, Uuid>,
        controller_id: Option<i32>,
        alive_brokers: HashMap<i32, Broker>,
        alive_nodes: AliveNodes,
    ) -> Self {
        let topic_names = topic_ids.iter().map(|(name, id)| (*id, name.clone())).collect();
        MetadataSnapshot {
            partition_states,
            topic_ids,
            topic_names,
            controller_id,
            alive_brokers,
            alive_nodes,
        }
    }

    pub fn all_topics(&self) -> HashSet<String> {
        self.partition_states.keys().cloned().collect()
    }
}
