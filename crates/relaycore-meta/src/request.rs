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

//! The `UpdateMetadataRequest` schema the controller pushes into the cache.
//! Wire encoding/decoding of this schema is out of scope here; the broker's
//! network layer is the external collaborator that turns bytes into these
//! structs.

use uuid::Uuid;

use crate::model::EndPoint;

#[derive(Debug, Clone)]
pub struct UpdateMetadataEndpoint {
    pub host: String,
    pub port: i32,
    pub listener: String,
    pub security_protocol: String,
}

impl From<&UpdateMetadataEndpoint> for EndPoint {
    fn from(ep: &UpdateMetadataEndpoint) -> Self {
        EndPoint {
            host: ep.host.clone(),
            port: ep.port,
            listener_name: ep.listener.clone(),
            security_protocol: ep.security_protocol.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateMetadataLiveBroker {
    pub id: i32,
    pub rack: Option<String>,
    pub endpoints: Vec<UpdateMetadataEndpoint>,
}

#[derive(Debug, Clone)]
pub struct UpdateMetadataTopicState {
    pub topic_name: String,
    /// Zero UUID means "clear this topic's id".
    pub topic_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdateMetadataPartitionState {
    pub topic_name: String,
    pub partition_index: i32,
    pub leader: i32,
    pub leader_epoch: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
    pub offline_replicas: Vec<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMetadataRequest {
    pub correlation_id: i32,
    /// Negative means "no controller".
    pub controller_id: i32,
    pub controller_epoch: i32,
    pub live_brokers: Vec<UpdateMetadataLiveBroker>,
    pub topic_states: Vec<UpdateMetadataTopicState>,
    pub partition_states: Vec<UpdateMetadataPartitionState>,
}
