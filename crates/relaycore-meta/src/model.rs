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

//! Plain value types shared by the metadata cache: partition descriptors,
//! broker/listener endpoints, and the sentinels the controller protocol
//! relies on.

use std::collections::HashMap;

/// There is no leader for the partition right now.
pub const NO_LEADER: i32 = -1;
/// The partition is in the middle of being deleted.
pub const LEADER_DURING_DELETE: i32 = -2;
/// The epoch to use while a partition is being deleted.
pub const EPOCH_DURING_DELETE: i32 = -2;
/// Sentinel leader id used in responses when the leader could not be resolved.
pub const NO_LEADER_ID: i32 = -1;

/// A single network endpoint exposed by a broker under a named listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndPoint {
    pub host: String,
    pub port: i32,
    pub listener_name: String,
    pub security_protocol: String,
}

/// A resolved node a client can connect to: the broker id plus one of its
/// endpoints. [`Node::no_node`] is the sentinel returned when a leader is
/// known but unreachable through the requested listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

impl Node {
    pub fn no_node() -> Node {
        Node {
            id: -1,
            host: String::new(),
            port: -1,
            rack: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id < 0 && self.host.is_empty() && self.port < 0
    }
}

/// A live broker: its id, all endpoints it exposes, and an optional rack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub id: i32,
    pub endpoints: Vec<EndPoint>,
    pub rack: Option<String>,
}

impl Broker {
    /// Resolves the node this broker exposes under `listener_name`, if any.
    pub fn node(&self, listener_name: &str) -> Option<Node> {
        self.endpoints
            .iter()
            .find(|ep| ep.listener_name == listener_name)
            .map(|ep| Node {
                id: self.id,
                host: ep.host.clone(),
                port: ep.port,
                rack: self.rack.clone(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderRecoveryState {
    Recovered,
    Recovering,
}

/// Immutable per-partition leadership descriptor as published by the
/// controller through `AlterPartition`-style updates. `leader_epoch` and
/// `partition_epoch` only ever increase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderAndIsr {
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub isr: Vec<i32>,
    pub leader_recovery_state: LeaderRecoveryState,
    pub partition_epoch: i32,
}

impl LeaderAndIsr {
    /// Equality that ignores `partition_epoch`, matching the comparison the
    /// controller uses to decide whether a state change is a no-op.
    pub fn eq_ignoring_partition_epoch(&self, other: &LeaderAndIsr) -> bool {
        self.leader_id == other.leader_id
            && self.leader_epoch == other.leader_epoch
            && self.isr == other.isr
            && self.leader_recovery_state == other.leader_recovery_state
    }
}

/// A topic-partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition_index: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition_index: i32) -> Self {
        TopicPartition {
            topic: topic.into(),
            partition_index,
        }
    }
}

/// Per-partition state as tracked by the cache: leadership plus the ordered
/// replica, ISR, and offline-replica lists the controller last published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionState {
    pub topic: String,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

impl PartitionState {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition_index)
    }
}

/// `brokerId -> listenerName -> Node`, precomputed once per live-broker list
/// so read paths never re-derive it.
pub type AliveNodes = HashMap<i32, HashMap<String, Node>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn leader_and_isr(partition_epoch: i32) -> LeaderAndIsr {
        LeaderAndIsr {
            leader_id: 1,
            leader_epoch: 4,
            isr: vec![1, 2],
            leader_recovery_state: LeaderRecoveryState::Recovered,
            partition_epoch,
        }
    }

    #[test]
    fn eq_ignoring_partition_epoch_ignores_only_partition_epoch() {
        let a = leader_and_isr(3);
        let b = leader_and_isr(7);
        assert_ne!(a, b);
        assert!(a.eq_ignoring_partition_epoch(&b));
    }

    #[test]
    fn eq_ignoring_partition_epoch_still_compares_the_other_fields() {
        let a = leader_and_isr(3);
        let mut b = leader_and_isr(3);
        b.leader_id = 2;
        assert!(!a.eq_ignoring_partition_epoch(&b));

        let mut c = leader_and_isr(3);
        c.isr = vec![1];
        assert!(!a.eq_ignoring_partition_epoch(&c));

        let mut d = leader_and_isr(3);
        d.leader_recovery_state = LeaderRecoveryState::Recovering;
        assert!(!a.eq_ignoring_partition_epoch(&d));
    }
}
