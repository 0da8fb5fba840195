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

//! The FIFO baseline policy.

use itertools::Itertools;
use log::trace;
use petgraph::prelude::*;
use rand::RngCore;
use std::collections::{HashMap, VecDeque};

use crate::weighted::WeightedMultimap;
use crate::{DecisionStructure, Error, Message, Scheduler, Tick, Topology};

/// Per-node FIFO state: one queue per input neighbor. Unlike the VOQ
/// policies, queues are keyed by where a message arrived from only, so a
/// blocked head-of-line message blocks everything behind it.
#[derive(Default, Debug)]
struct FifoState {
    queues: HashMap<NodeIndex, VecDeque<Message>>,
    decisions: DecisionStructure,
}

impl FifoState {
    fn queued(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

/// Head-of-line matching in a single round: every non-empty input queue
/// requests the output its head message needs; every requested idle output
/// grants one requesting input uniformly at random.
///
/// The result is a valid matching by construction: each input holds one
/// queue, and each output grants at most once.
#[derive(Default)]
pub struct FifoScheduler {
    nodes: HashMap<NodeIndex, FifoState>,
}

impl FifoScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for FifoScheduler {
    fn register(&mut self, node: NodeIndex) {
        self.nodes.insert(node, FifoState::default());
    }

    fn decision_structure(&self, node: NodeIndex) -> Result<&DecisionStructure, Error> {
        self.nodes
            .get(&node)
            .map(|state| &state.decisions)
            .ok_or(Error::UnknownNode(node))
    }

    fn decision_structure_mut(
        &mut self,
        node: NodeIndex,
    ) -> Result<&mut DecisionStructure, Error> {
        self.nodes
            .get_mut(&node)
            .map(|state| &mut state.decisions)
            .ok_or(Error::UnknownNode(node))
    }

    fn enqueue(
        &mut self,
        _t: Tick,
        from: NodeIndex,
        node: NodeIndex,
        msg: Message,
    ) -> Result<(), Error> {
        let state = self.nodes.get_mut(&node).ok_or(Error::UnknownNode(node))?;
        state.queues.entry(from).or_default().push_back(msg);
        Ok(())
    }

    fn schedule(
        &mut self,
        t: Tick,
        node: NodeIndex,
        topo: &Topology,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        let idle = topo.node(node).borrow().idle_outputs().clone();
        let state = self.nodes.get_mut(&node).ok_or(Error::UnknownNode(node))?;

        // Requests, partitioned by the output the head message needs.
        // Iteration is sorted so a seeded run replays identically.
        let mut requests: WeightedMultimap<NodeIndex, NodeIndex> = WeightedMultimap::new();
        for input in state.queues.keys().copied().sorted() {
            let head = state.queues[&input]
                .front()
                .expect("empty queues are removed eagerly");
            let output = state.decisions.next_hop(head)?;
            if idle.contains(&output) {
                requests.insert(output, input, 1.0);
            }
        }

        // One uniform grant per requested output.
        let mut grants = Vec::new();
        for output in requests.keys().copied().sorted() {
            let input = *requests
                .pick(&output, rng)
                .expect("requested outputs have requesters");
            grants.push((input, output));
        }

        for (input, output) in grants {
            let queue = state
                .queues
                .get_mut(&input)
                .expect("granted inputs have queues");
            let msg = queue.pop_front().expect("granted queues are non-empty");
            if queue.is_empty() {
                state.queues.remove(&input);
            }
            trace!("fifo grant at {}: {} -> {}", node.index(), input.index(), output.index());
            topo.transmit(t, node, output, msg)?;
        }
        Ok(())
    }

    fn queued_messages(&self) -> usize {
        self.nodes.values().map(FifoState::queued).sum()
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}
