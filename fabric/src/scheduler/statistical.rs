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

//! Statistical matching.
//!
//! Grants are drawn with probability proportional to the capacity reserved
//! across each `(input, output)` pair, biasing the stationary matching
//! toward the provisioned allocation. A short PIM pass afterwards mops up
//! the collisions.

use itertools::Itertools;
use log::debug;
use petgraph::prelude::*;
use rand::{Rng, RngCore};
use std::collections::HashSet;

use crate::constants::{STAT_PIM_ROUNDS, STAT_ROUNDS};
use crate::scheduler::pim::maximal_matching;
use crate::scheduler::{Scheduler, VoqCore};
use crate::weighted::WeightedMultimap;
use crate::{DecisionStructure, Error, Message, Tick, Topology, VoqKey};

pub struct StatisticalScheduler {
    core: VoqCore,
    rounds: usize,
    cleanup_rounds: usize,
}

impl Default for StatisticalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticalScheduler {
    pub fn new() -> Self {
        Self {
            core: VoqCore::default(),
            rounds: STAT_ROUNDS,
            cleanup_rounds: STAT_PIM_ROUNDS,
        }
    }
}

impl Scheduler for StatisticalScheduler {
    fn register(&mut self, node: NodeIndex) {
        self.core.register(node);
    }

    fn decision_structure(&self, node: NodeIndex) -> Result<&DecisionStructure, Error> {
        Ok(&self.core.state(node)?.decisions)
    }

    fn decision_structure_mut(
        &mut self,
        node: NodeIndex,
    ) -> Result<&mut DecisionStructure, Error> {
        Ok(&mut self.core.state_mut(node)?.decisions)
    }

    fn enqueue(
        &mut self,
        _t: Tick,
        from: NodeIndex,
        node: NodeIndex,
        msg: Message,
    ) -> Result<(), Error> {
        self.core.enqueue(from, node, msg)
    }

    fn schedule(
        &mut self,
        t: Tick,
        node: NodeIndex,
        topo: &Topology,
        rng: &mut dyn RngCore,
    ) -> Result<(), Error> {
        let mut idle = topo.node(node).borrow().idle_outputs().clone();
        let mut available = self.core.eligible(node, &idle)?;
        let mut program: Vec<VoqKey> = Vec::new();

        let state = self.core.state(node)?;
        for _ in 0..self.rounds {
            if available.is_empty() {
                break;
            }

            // Grant: each idle output with pending traffic draws an input
            // weighted by reserved capacity, then a secondary weight m_ij
            // uniform in 0..=X_ij.
            let mut grants: WeightedMultimap<NodeIndex, NodeIndex> = WeightedMultimap::new();
            for output in idle.iter().copied().sorted() {
                let Some(input) =
                    state
                        .decisions
                        .pick_random_input_among(output, rng, &available)
                else {
                    continue;
                };
                let x = state.decisions.reserved_capacity(VoqKey::new(input, output));
                let m = rng.gen_range(0..=x);
                grants.insert(input, output, m as f64);
            }

            // Accept: each granted input takes an output weighted by m_ij.
            // All-zero weights or an emptied VOQ skip the input this round.
            let mut matched_inputs = HashSet::new();
            let mut matched_outputs = HashSet::new();
            for input in grants.keys().copied().sorted() {
                let Some(&output) = grants.pick(&input, rng) else {
                    continue;
                };
                let key = VoqKey::new(input, output);
                if state.voqs.len(key) == 0 {
                    continue;
                }
                program.push(key);
                matched_inputs.insert(input);
                matched_outputs.insert(output);
            }

            // Invalidate matched terminals for the rest of the slot.
            available.retain(|key| {
                !matched_inputs.contains(&key.input) && !matched_outputs.contains(&key.output)
            });
            for output in &matched_outputs {
                idle.remove(output);
            }
        }

        // PIM cleanup over the residual VOQs keeps the matching near-maximal
        // when the weighted grants collide.
        if !available.is_empty() {
            let cleanup = maximal_matching(&available, self.cleanup_rounds, rng);
            program.extend(cleanup.matching);
        }

        if !program.is_empty() {
            debug!(
                "statistical at {} @{}: matched {} voqs",
                node.index(),
                t,
                program.len()
            );
        }
        self.core.execute(t, node, &program, topo)
    }

    fn queued_messages(&self) -> usize {
        self.core.queued_messages()
    }

    fn name(&self) -> &'static str {
        "statistical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    /// A 2x2 switch with all four VOQs pending schedules a full matching in
    /// one slot: the weighted round grants at most one edge per terminal and
    /// the PIM cleanup completes the rest.
    #[test]
    fn weighted_round_plus_cleanup_fills_the_slot() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(99);
        let mut topo = Topology::new();
        let sw = topo.add_node(NodeKind::Switch);
        let in_a = topo.add_node(NodeKind::Switch);
        let in_b = topo.add_node(NodeKind::Switch);
        let out_a = topo.add_node(NodeKind::Receiver(Default::default()));
        let out_b = topo.add_node(NodeKind::Receiver(Default::default()));
        topo.add_link(sw, out_a, 1).unwrap();
        topo.add_link(sw, out_b, 1).unwrap();

        let mut sched = StatisticalScheduler::new();
        sched.register(sw);
        {
            let ds = sched.decision_structure_mut(sw).unwrap();
            for (src, dst) in [(in_a, out_a), (in_a, out_b), (in_b, out_a), (in_b, out_b)] {
                ds.put_decision(src, dst, dst);
                ds.set_reserved_capacity(VoqKey::new(src, dst), 10);
            }
        }
        for (src, dst) in [(in_a, out_a), (in_a, out_b), (in_b, out_a), (in_b, out_b)] {
            sched.enqueue(0, src, sw, Message::new(src, dst, 0)).unwrap();
        }
        assert_eq!(sched.queued_messages(), 4);

        sched.schedule(0, sw, &topo, &mut rng).unwrap();
        // two distinct inputs to two distinct outputs
        assert_eq!(sched.queued_messages(), 2);
        assert_eq!(topo.in_flight(), 2);
    }

    /// Outputs without provisioned flows never receive statistical grants;
    /// the cleanup pass still schedules their pending VOQs.
    #[test]
    fn unprovisioned_voqs_fall_through_to_cleanup() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let mut topo = Topology::new();
        let sw = topo.add_node(NodeKind::Switch);
        let src = topo.add_node(NodeKind::Switch);
        let out = topo.add_node(NodeKind::Receiver(Default::default()));
        topo.add_link(sw, out, 1).unwrap();

        let mut sched = StatisticalScheduler::new();
        sched.register(sw);
        // a route but no reservation
        sched
            .decision_structure_mut(sw)
            .unwrap()
            .put_decision(src, out, out);
        sched.enqueue(0, src, sw, Message::new(src, out, 0)).unwrap();

        sched.schedule(0, sw, &topo, &mut rng).unwrap();
        assert_eq!(sched.queued_messages(), 0);
        assert_eq!(topo.in_flight(), 1);
    }
}
