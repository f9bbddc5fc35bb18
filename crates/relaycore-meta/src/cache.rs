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

//! The per-node metadata cache. `update_metadata` is the only writer path
//! and takes `update_lock`; every read path loads the current snapshot once
//! via `ArcSwap::load_full` and never touches the lock, so readers never
//! block on a concurrent update and never observe a torn snapshot.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::model::AliveNodes;
use crate::model::Broker;
use crate::model::EndPoint;
use crate::model::Node;
use crate::model::PartitionState;
use crate::model::TopicPartition;
use crate::model::LEADER_DURING_DELETE;
use crate::model::NO_LEADER_ID;
use crate::request::UpdateMetadataRequest;
use crate::response::Cluster;
use crate::response::ErrorCode;
use crate::response::PartitionMetadata;
use crate::response::ReplicaEndpoints;
use crate::response::TopicMetadata;
use crate::snapshot::MetadataSnapshot;

/// Topics the controller never hands to ordinary clients, by naming
/// convention (`__consumer_offsets` and friends).
pub fn is_internal_topic(name: &str) -> bool {
    name.starts_with("__")
}

pub struct MetadataCache {
    broker_id: i32,
    snapshot: ArcSwap<MetadataSnapshot>,
    update_lock: Mutex<()>,
}

impl MetadataCache {
    pub fn new(broker_id: i32) -> Self {
        MetadataCache {
            broker_id,
            snapshot: ArcSwap::from_pointee(MetadataSnapshot::default()),
            update_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<MetadataSnapshot> {
        self.snapshot.load_full()
    }

    pub fn broker_id(&self) -> i32 {
        self.broker_id
    }

    // ---- read paths -----------------------------------------------------

    pub fn get_all_topics(&self) -> HashSet<String> {
        self.snapshot().all_topics()
    }

    pub fn get_topic_partitions(&self, topic: &str) -> Vec<TopicPartition> {
        let snapshot = self.snapshot();
        match snapshot.partition_states.get(topic) {
            Some(partitions) => partitions
                .keys()
                .map(|&index| TopicPartition::new(topic, index))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn get_non_existing_topics(&self, topics: &[String]) -> Vec<String> {
        let snapshot = self.snapshot();
        topics
            .iter()
            .filter(|topic| !snapshot.partition_states.contains_key(topic.as_str()))
            .cloned()
            .collect()
    }

    pub fn num_partitions(&self, topic: &str) -> Option<usize> {
        self.snapshot().partition_states.get(topic).map(HashMap::len)
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.snapshot().partition_states.contains_key(topic)
    }

    pub fn contains(&self, tp: &TopicPartition) -> bool {
        self.snapshot()
            .partition_states
            .get(&tp.topic)
            .is_some_and(|partitions| partitions.contains_key(&tp.partition_index))
    }

    pub fn get_controller_id(&self) -> Option<i32> {
        self.snapshot().controller_id
    }

    pub fn get_topic_id(&self, topic: &str) -> Option<Uuid> {
        self.snapshot().topic_ids.get(topic).copied()
    }

    pub fn get_topic_name(&self, topic_id: Uuid) -> Option<String> {
        self.snapshot().topic_names.get(&topic_id).cloned()
    }

    pub fn topic_id_info(&self) -> (HashMap<String, Uuid>, HashMap<Uuid, String>) {
        let snapshot = self.snapshot();
        (snapshot.topic_ids.clone(), snapshot.topic_names.clone())
    }

    pub fn get_alive_brokers(&self) -> Vec<Broker> {
        self.snapshot().alive_brokers.values().cloned().collect()
    }

    pub fn get_alive_broker_node(&self, broker_id: i32, listener: &str) -> Option<Node> {
        self.snapshot()
            .alive_nodes
            .get(&broker_id)
            .and_then(|endpoints| endpoints.get(listener))
            .cloned()
    }

    pub fn get_alive_broker_nodes(&self, listener: &str) -> Vec<Node> {
        self.snapshot()
            .alive_nodes
            .values()
            .filter_map(|endpoints| endpoints.get(listener).cloned())
            .collect()
    }

    /// `None` if the partition is unknown. `Some(Node::no_node())` if the
    /// leader is known but unreachable through `listener`. Otherwise the
    /// resolved node.
    pub fn get_partition_leader_endpoint(
        &self,
        topic: &str,
        partition: i32,
        listener: &str,
    ) -> Option<Node> {
        let snapshot = self.snapshot();
        let state = snapshot.partition_states.get(topic)?.get(&partition)?;
        let node = snapshot
            .alive_nodes
            .get(&state.leader_id)
            .and_then(|endpoints| endpoints.get(listener))
            .cloned();
        Some(node.unwrap_or_else(Node::no_node))
    }

    pub fn get_partition_replica_endpoints(
        &self,
        tp: &TopicPartition,
        listener: &str,
    ) -> ReplicaEndpoints {
        let snapshot = self.snapshot();
        let mut out = HashMap::new();
        if let Some(state) = snapshot
            .partition_states
            .get(&tp.topic)
            .and_then(|partitions| partitions.get(&tp.partition_index))
        {
            for &replica_id in &state.replicas {
                if let Some(node) = snapshot
                    .alive_nodes
                    .get(&replica_id)
                    .and_then(|endpoints| endpoints.get(listener))
                {
                    out.insert(replica_id, node.clone());
                }
            }
        }
        out
    }

    pub fn get_topic_metadata(
        &self,
        topics: &[String],
        listener: &str,
        error_unavailable_endpoints: bool,
        error_unavailable_listeners: bool,
    ) -> Vec<TopicMetadata> {
        let snapshot = self.snapshot();
        let mut out = Vec::new();
        for topic in topics {
            let Some(partitions) = snapshot.partition_states.get(topic) else {
                continue;
            };
            let mut metadata: Vec<PartitionMetadata> = partitions
                .values()
                .map(|state| {
                    build_partition_metadata(
                        &snapshot,
                        state,
                        listener,
                        error_unavailable_endpoints,
                        error_unavailable_listeners,
                    )
                })
                .collect();
            metadata.sort_by_key(|p| p.partition_index);
            out.push(TopicMetadata {
                error_code: ErrorCode::None,
                name: topic.clone(),
                topic_id: snapshot.topic_ids.get(topic).copied().unwrap_or(Uuid::nil()),
                is_internal: is_internal_topic(topic),
                partitions: metadata,
            });
        }
        out
    }

    pub fn get_cluster_metadata(&self, cluster_id: Option<String>, listener: &str) -> Cluster {
        let snapshot = self.snapshot();
        let nodes = snapshot
            .alive_nodes
            .values()
            .filter_map(|endpoints| endpoints.get(listener).cloned())
            .collect();

        let mut partitions = Vec::new();
        let mut internal_topics = Vec::new();
        for (topic, states) in &snapshot.partition_states {
            if is_internal_topic(topic) {
                internal_topics.push(topic.clone());
            }
            for state in states.values() {
                if state.leader_id == LEADER_DURING_DELETE {
                    continue;
                }
                partitions.push(build_partition_metadata(&snapshot, state, listener, false, false));
            }
        }

        let controller_node = snapshot.controller_id.and_then(|id| {
            snapshot
                .alive_nodes
                .get(&id)
                .and_then(|endpoints| endpoints.get(listener))
                .cloned()
        });

        Cluster {
            cluster_id,
            nodes,
            partitions,
            unauthorized_topics: Vec::new(),
            internal_topics,
            controller_node,
        }
    }

    // ---- write path -------------------------------------------------------

    /// Installs a new snapshot built from `request`, returning the
    /// partitions this update deleted. Serialized with other updates via
    /// `update_lock`; concurrent readers are never blocked.
    pub fn update_metadata(
        &self,
        correlation_id: i32,
        request: UpdateMetadataRequest,
    ) -> Vec<TopicPartition> {
        let _guard = self.update_lock.lock().unwrap();
        log::debug!(
            "broker {} processing metadata update with correlation id {correlation_id}",
            self.broker_id
        );

        let previous = self.snapshot();

        let mut alive_brokers = HashMap::new();
        let mut alive_nodes: AliveNodes = HashMap::new();
        for live_broker in &request.live_brokers {
            let endpoints: Vec<EndPoint> = live_broker.endpoints.iter().map(EndPoint::from).collect();
            let mut nodes = HashMap::new();
            for ep in &live_broker.endpoints {
                nodes.insert(
                    ep.listener.clone(),
                    Node {
                        id: live_broker.id,
                        host: ep.host.clone(),
                        port: ep.port,
                        rack: live_broker.rack.clone(),
                    },
                );
            }
            alive_nodes.insert(live_broker.id, nodes);
            alive_brokers.insert(
                live_broker.id,
                Broker {
                    id: live_broker.id,
                    endpoints,
                    rack: live_broker.rack.clone(),
                },
            );
        }

        let controller_id = (request.controller_id >= 0).then_some(request.controller_id);

        warn_if_listeners_diverge(&alive_brokers);

        let mut topic_ids = previous.topic_ids.clone();
        for topic_state in &request.topic_states {
            if topic_state.topic_id.is_nil() {
                topic_ids.remove(&topic_state.topic_name);
            } else {
                topic_ids.insert(topic_state.topic_name.clone(), topic_state.topic_id);
            }
        }

        if request.partition_states.is_empty() {
            let snapshot = MetadataSnapshot::new(
                previous.partition_states.clone(),
                topic_ids,
                controller_id,
                alive_brokers,
                alive_nodes,
            );
            self.snapshot.store(Arc::new(snapshot));
            return Vec::new();
        }

        let mut partition_states = previous.partition_states.clone();
        let mut deleted = Vec::new();
        for update in &request.partition_states {
            let tp = TopicPartition::new(update.topic_name.clone(), update.partition_index);
            if update.leader == LEADER_DURING_DELETE {
                if let Some(inner) = partition_states.get_mut(&update.topic_name) {
                    inner.remove(&update.partition_index);
                    if inner.is_empty() {
                        partition_states.remove(&update.topic_name);
                        topic_ids.remove(&update.topic_name);
                    }
                }
                deleted.push(tp);
            } else {
                partition_states
                    .entry(update.topic_name.clone())
                    .or_default()
                    .insert(
                        update.partition_index,
                        PartitionState {
                            topic: update.topic_name.clone(),
                            partition_index: update.partition_index,
                            leader_id: update.leader,
                            leader_epoch: update.leader_epoch,
                            replicas: update.replicas.clone(),
                            isr: update.isr.clone(),
                            offline_replicas: update.offline_replicas.clone(),
                        },
                    );
            }
        }

        let snapshot = MetadataSnapshot::new(partition_states, topic_ids, controller_id, alive_brokers, alive_nodes);
        self.snapshot.store(Arc::new(snapshot));
        deleted
    }
}

fn build_partition_metadata(
    snapshot: &MetadataSnapshot,
    state: &PartitionState,
    listener: &str,
    error_unavailable_endpoints: bool,
    error_unavailable_listeners: bool,
) -> PartitionMetadata {
    let leader_is_alive = snapshot.alive_brokers.contains_key(&state.leader_id);
    let leader_node = leader_is_alive
        .then(|| {
            snapshot
                .alive_nodes
                .get(&state.leader_id)
                .and_then(|endpoints| endpoints.get(listener))
        })
        .flatten();

    let (replica_nodes, replicas_filtered) =
        resolve_ids(snapshot, &state.replicas, listener, error_unavailable_endpoints);
    let (isr_nodes, isr_filtered) = resolve_ids(snapshot, &state.isr, listener, error_unavailable_endpoints);

    let error_code = if !leader_is_alive {
        ErrorCode::LeaderNotAvailable
    } else if leader_node.is_none() {
        if error_unavailable_listeners {
            ErrorCode::ListenerNotFound
        } else {
            ErrorCode::LeaderNotAvailable
        }
    } else if replicas_filtered || isr_filtered {
        ErrorCode::ReplicaNotAvailable
    } else {
        ErrorCode::None
    };

    let leader_id = if leader_node.is_some() {
        state.leader_id
    } else {
        NO_LEADER_ID
    };

    PartitionMetadata {
        error_code,
        partition_index: state.partition_index,
        leader_id,
        leader_epoch: state.leader_epoch,
        replica_nodes,
        isr_nodes,
        offline_replicas: state.offline_replicas.clone(),
    }
}

/// Passes `ids` through verbatim unless `filter` is set, in which case only
/// ids that are alive and expose `listener` survive. Returns whether
/// anything was dropped.
fn resolve_ids(snapshot: &MetadataSnapshot, ids: &[i32], listener: &str, filter: bool) -> (Vec<i32>, bool) {
    if !filter {
        return (ids.to_vec(), false);
    }
    let mut out = Vec::with_capacity(ids.len());
    let mut any_filtered = false;
    for &id in ids {
        let available = snapshot
            .alive_nodes
            .get(&id)
            .and_then(|endpoints| endpoints.get(listener))
            .is_some();
        if available {
            out.push(id);
        } else {
            any_filtered = true;
        }
    }
    (out, any_filtered)
}

fn warn_if_listeners_diverge(alive_brokers: &HashMap<i32, Broker>) {
    let mut listener_sets = alive_brokers.values().map(|broker| {
        let mut names: Vec<&str> = broker.endpoints.iter().map(|ep| ep.listener_name.as_str()).collect();
        names.sort_unstable();
        names
    });
    if let Some(first) = listener_sets.next() {
        if listener_sets.any(|other| other != first) {
            log::warn!(
                "live brokers do not expose an identical listener set; metadata reads for a \
                 given listener may see partial coverage"
            );
        }
    }
}
