// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Discrete-event simulation of input-queued crossbar switch scheduling.
//!
//! Messages hop between nodes over rate-limited links; at every switch a
//! pluggable scheduler computes a matching between virtual output queues
//! (VOQs) and idle output ports, one matching per time slot.

mod constants;
mod decision;
mod error;
mod flow;
mod link;
mod message;
mod network;
mod node;
mod patterns;
mod scheduler;
mod stats;
mod voq;
mod weighted;

// Public types
// type to use for simulation time slots
pub type Tick = usize;

pub use crate::constants::{
    FRAME_SIZE, PIM_ROUNDS, SAFE_CAPACITY, STAT_PIM_ROUNDS, STAT_ROUNDS,
};
pub use crate::decision::DecisionStructure;
pub use crate::error::Error;
pub use crate::flow::Flow;
pub use crate::link::Link;
pub use crate::message::Message;
pub use crate::network::{FlowKey, Network};
pub use crate::node::{Delivery, Generator, NodeCore, NodeKind, Receiver, Topology};
pub use crate::patterns::{privileged, uniform, DEFAULT_FABRIC_SIZE};
pub use crate::scheduler::fifo::FifoScheduler;
pub use crate::scheduler::pim::{maximal_matching, MatchOutcome, ParallelScheduler};
pub use crate::scheduler::statistical::StatisticalScheduler;
pub use crate::scheduler::Scheduler;
pub use crate::stats::TrafficSummary;
pub use crate::voq::{VoqKey, VoqTable};
pub use crate::weighted::{WeightedMultimap, WeightedSet};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
