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

//! An in-memory, eventually-consistent view of cluster metadata that every
//! broker node keeps locally. The controller is the only writer; every
//! request-handling thread on the node is a reader.

pub mod cache;
pub mod model;
pub mod request;
pub mod response;
pub mod snapshot;

pub use cache::is_internal_topic;
pub use cache::MetadataCache;
pub use model::Broker;
pub use model::EndPoint;
pub use model::LeaderAndIsr;
pub use model::LeaderRecoveryState;
pub use model::Node;
pub use model::PartitionState;
pub use model::TopicPartition;
pub use request::UpdateMetadataRequest;
pub use response::Cluster;
pub use response::ErrorCode;
pub use response::TopicMetadata;
pub use snapshot::MetadataSnapshot;

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::request::UpdateMetadataEndpoint;
    use crate::request::UpdateMetadataLiveBroker;
    use crate::request::UpdateMetadataPartitionState;
    use crate::request::UpdateMetadataTopicState;

    fn endpoint(host: &str, port: i32) -> UpdateMetadataEndpoint {
        UpdateMetadataEndpoint {
            host: host.to_string(),
            port,
            listener: "PLAINTEXT".to_string(),
            security_protocol: "PLAINTEXT".to_string(),
        }
    }

    fn basic_request(topic_id: Uuid) -> UpdateMetadataRequest {
        UpdateMetadataRequest {
            correlation_id: 1,
            controller_id: 1,
            controller_epoch: 1,
            live_brokers: vec![
                UpdateMetadataLiveBroker {
                    id: 1,
                    rack: None,
                    endpoints: vec![endpoint("broker-1", 9092)],
                },
                UpdateMetadataLiveBroker {
                    id: 2,
                    rack: None,
                    endpoints: vec![endpoint("broker-2", 9092)],
                },
            ],
            topic_states: vec![UpdateMetadataTopicState {
                topic_name: "orders".to_string(),
                topic_id,
            }],
            partition_states: vec![
                UpdateMetadataPartitionState {
                    topic_name: "orders".to_string(),
                    partition_index: 0,
                    leader: 1,
                    leader_epoch: 0,
                    replicas: vec![1, 2],
                    isr: vec![1, 2],
                    offline_replicas: vec![],
                },
                UpdateMetadataPartitionState {
                    topic_name: "orders".to_string(),
                    partition_index: 1,
                    leader: 2,
                    leader_epoch: 0,
                    replicas: vec![1, 2],
                    isr: vec![1, 2],
                    offline_replicas: vec![],
                },
            ],
        }
    }

    #[test]
    fn update_then_read_is_immediately_visible() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        let deleted = cache.update_metadata(1, basic_request(topic_id));
        assert!(deleted.is_empty());

        assert_eq!(cache.get_all_topics(), ["orders".to_string()].into());
        assert_eq!(cache.num_partitions("orders"), Some(2));
        assert_eq!(cache.get_topic_id("orders"), Some(topic_id));
        assert_eq!(cache.get_topic_name(topic_id), Some("orders".to_string()));
        assert_eq!(cache.get_controller_id(), Some(1));
        assert!(cache.contains(&TopicPartition::new("orders", 0)));
        assert!(!cache.contains(&TopicPartition::new("orders", 7)));
    }

    #[test]
    fn partition_state_update_deep_copies_instead_of_mutating_published_snapshot() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        cache.update_metadata(1, basic_request(topic_id));

        let before = cache.get_topic_partitions("orders");
        assert_eq!(before.len(), 2);

        let mut second = basic_request(topic_id);
        second.partition_states.truncate(1);
        second.partition_states[0].leader = 2;
        second.partition_states[0].leader_epoch = 1;
        cache.update_metadata(2, second);

        // the handle captured before the second update still reports two
        // partitions: no shared mutable state leaked across snapshots.
        assert_eq!(before.len(), 2);
        assert_eq!(cache.get_topic_partitions("orders").len(), 2);
        let leader = cache.get_partition_leader_endpoint("orders", 0, "PLAINTEXT").unwrap();
        assert_eq!(leader.id, 2);
    }

    #[test]
    fn leader_during_delete_drops_the_partition_and_reports_it_as_deleted() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        cache.update_metadata(1, basic_request(topic_id));

        let mut delete_request = UpdateMetadataRequest {
            correlation_id: 2,
            controller_id: 1,
            controller_epoch: 1,
            live_brokers: basic_request(topic_id).live_brokers,
            topic_states: vec![],
            partition_states: vec![
                UpdateMetadataPartitionState {
                    topic_name: "orders".to_string(),
                    partition_index: 0,
                    leader: model::LEADER_DURING_DELETE,
                    leader_epoch: model::EPOCH_DURING_DELETE,
                    replicas: vec![],
                    isr: vec![],
                    offline_replicas: vec![],
                },
                UpdateMetadataPartitionState {
                    topic_name: "orders".to_string(),
                    partition_index: 1,
                    leader: model::LEADER_DURING_DELETE,
                    leader_epoch: model::EPOCH_DURING_DELETE,
                    replicas: vec![],
                    isr: vec![],
                    offline_replicas: vec![],
                },
            ],
        };
        delete_request.topic_states.clear();

        let deleted = cache.update_metadata(2, delete_request);
        assert_eq!(deleted.len(), 2);
        assert!(!cache.contains_topic("orders"));
        assert_eq!(cache.get_all_topics().len(), 0);
    }

    #[test]
    fn request_with_no_partition_states_republishes_brokers_only() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        cache.update_metadata(1, basic_request(topic_id));

        let refresh = UpdateMetadataRequest {
            correlation_id: 3,
            controller_id: 1,
            controller_epoch: 2,
            live_brokers: vec![UpdateMetadataLiveBroker {
                id: 1,
                rack: None,
                endpoints: vec![endpoint("broker-1", 9092)],
            }],
            topic_states: vec![],
            partition_states: vec![],
        };
        let deleted = cache.update_metadata(3, refresh);
        assert!(deleted.is_empty());
        assert_eq!(cache.get_topic_partitions("orders").len(), 2);
        assert_eq!(cache.get_alive_brokers().len(), 1);
    }

    #[test]
    fn topic_metadata_reports_leader_not_available_when_leader_is_dead() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        let mut request = basic_request(topic_id);
        request.live_brokers.truncate(1); // drop broker 2, which leads partition 1
        cache.update_metadata(1, request);

        let metadata = cache.get_topic_metadata(&["orders".to_string()], "PLAINTEXT", false, false);
        let topic = &metadata[0];
        let p1 = topic.partitions.iter().find(|p| p.partition_index == 1).unwrap();
        assert_eq!(p1.error_code, ErrorCode::LeaderNotAvailable);
        assert_eq!(p1.leader_id, model::NO_LEADER_ID);
    }

    #[test]
    fn replica_endpoints_omit_dead_replicas() {
        let cache = MetadataCache::new(1);
        let topic_id = Uuid::new_v4();
        let mut request = basic_request(topic_id);
        request.live_brokers.truncate(1);
        cache.update_metadata(1, request);

        let endpoints = cache.get_partition_replica_endpoints(&TopicPartition::new("orders", 0), "PLAINTEXT");
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints.contains_key(&1));
        assert!(!endpoints.contains_key(&2));
    }
}
