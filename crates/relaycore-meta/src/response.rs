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

//! Output schemas produced by the cache's read paths. Like
//! [`crate::request`], these are plain structs: turning them into wire bytes
//! is the network layer's job, not this crate's.

use std::collections::HashMap;

use uuid::Uuid;

use crate::model::Node;

/// Per-partition / per-topic error code, mirroring the subset of the Kafka
/// protocol error space that metadata responses can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    None,
    LeaderNotAvailable,
    ListenerNotFound,
    ReplicaNotAvailable,
    UnknownTopicOrPartition,
}

impl ErrorCode {
    /// Numeric code matching the Kafka protocol's `Errors` enum, so a wire
    /// layer can serialize this without reinventing the mapping.
    pub fn code(self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::LeaderNotAvailable => 5,
            ErrorCode::ReplicaNotAvailable => 9,
            ErrorCode::ListenerNotFound => 72,
            ErrorCode::UnknownTopicOrPartition => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartitionMetadata {
    pub error_code: ErrorCode,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct TopicMetadata {
    pub error_code: ErrorCode,
    pub name: String,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
}

/// Output of `getClusterMetadata`: the subset of cluster state a client
/// library needs to route requests.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: Option<String>,
    pub nodes: Vec<Node>,
    pub partitions: Vec<PartitionMetadata>,
    /// Always empty: authorization is out of scope for this cache.
    pub unauthorized_topics: Vec<String>,
    pub internal_topics: Vec<String>,
    pub controller_node: Option<Node>,
}

/// `replicaId -> Node`, omitting replicas whose node could not be resolved.
pub type ReplicaEndpoints = HashMap<i32, Node>;
