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

//! Scheduling policies and the machinery shared between them.
//!
//! One scheduler instance serves every node of a network. All per-node
//! state (queues, routing decisions) lives here, keyed by node id, so nodes
//! carry no back-pointers to their scheduler.

use petgraph::prelude::*;
use rand::RngCore;
use std::collections::{HashMap, HashSet};

use crate::{DecisionStructure, Error, Message, Tick, Topology, VoqKey, VoqTable};

pub mod fifo;
pub mod pim;
pub mod statistical;

/// The capabilities a network needs from a scheduling policy.
pub trait Scheduler {
    /// Places `node` under this scheduler's domain, initializing its queue
    /// state and decision structure.
    fn register(&mut self, node: NodeIndex);

    fn decision_structure(&self, node: NodeIndex) -> Result<&DecisionStructure, Error>;

    fn decision_structure_mut(
        &mut self,
        node: NodeIndex,
    ) -> Result<&mut DecisionStructure, Error>;

    /// Queues `msg`, which hopped from `from` to `node` at slot `t`, to be
    /// sent onward when a matching selects it. A node queues its own
    /// freshly-generated messages with `from == node`.
    fn enqueue(
        &mut self,
        t: Tick,
        from: NodeIndex,
        node: NodeIndex,
        msg: Message,
    ) -> Result<(), Error>;

    /// Computes this slot's matching at `node` and transmits the selected
    /// messages over their output links.
    fn schedule(
        &mut self,
        t: Tick,
        node: NodeIndex,
        topo: &Topology,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error>;

    /// Messages queued across all nodes under this scheduler.
    fn queued_messages(&self) -> usize;

    fn name(&self) -> &'static str;

    /// The next node in the flow to carry `msg` onward from `node`.
    fn next_hop(&self, node: NodeIndex, msg: &Message) -> Result<NodeIndex, Error> {
        self.decision_structure(node)?.next_hop(msg)
    }
}

/// Per-node state of a VOQ-based scheduler.
#[derive(Default, Debug)]
pub(crate) struct VoqState {
    pub voqs: VoqTable,
    pub decisions: DecisionStructure,
}

/// The part of VOQ scheduling every policy shares: queue bookkeeping and the
/// execution of a planned matching.
#[derive(Default, Debug)]
pub(crate) struct VoqCore {
    nodes: HashMap<NodeIndex, VoqState>,
}

impl VoqCore {
    pub fn register(&mut self, node: NodeIndex) {
        self.nodes.insert(node, VoqState::default());
    }

    pub fn state(&self, node: NodeIndex) -> Result<&VoqState, Error> {
        self.nodes.get(&node).ok_or(Error::UnknownNode(node))
    }

    pub fn state_mut(&mut self, node: NodeIndex) -> Result<&mut VoqState, Error> {
        self.nodes.get_mut(&node).ok_or(Error::UnknownNode(node))
    }

    /// Appends `msg` to the VOQ keyed by where it came from and where it
    /// goes next.
    pub fn enqueue(
        &mut self,
        from: NodeIndex,
        node: NodeIndex,
        msg: Message,
    ) -> Result<(), Error> {
        let state = self.state_mut(node)?;
        let next = state.decisions.next_hop(&msg)?;
        state.voqs.enqueue(VoqKey::new(from, next), msg);
        Ok(())
    }

    /// The VOQs at `node` whose output port is currently idle.
    pub fn eligible(
        &self,
        node: NodeIndex,
        idle_outputs: &HashSet<NodeIndex>,
    ) -> Result<HashSet<VoqKey>, Error> {
        Ok(self
            .state(node)?
            .voqs
            .available()
            .into_iter()
            .filter(|key| idle_outputs.contains(&key.output))
            .collect())
    }

    /// Dequeues the head of each planned VOQ and transmits it. A plan that
    /// reuses an input terminal is a policy bug and fails here; a reused
    /// output terminal is caught by the port bookkeeping in `transmit`.
    pub fn execute(
        &mut self,
        t: Tick,
        node: NodeIndex,
        program: &[VoqKey],
        topo: &Topology,
    ) -> Result<(), Error> {
        let state = self.state_mut(node)?;
        let mut used_inputs = HashSet::new();
        for key in program {
            if !used_inputs.insert(key.input) {
                return Err(Error::DuplicateInput(key.input));
            }
            let msg = state.voqs.pop(*key)?;
            topo.transmit(t, node, key.output, msg)?;
        }
        Ok(())
    }

    pub fn queued_messages(&self) -> usize {
        self.nodes.values().map(|state| state.voqs.total_len()).sum()
    }
}
