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

//! Parallel iterative matching (PIM).

use itertools::Itertools;
use log::debug;
use petgraph::prelude::*;
use rand::{Rng, RngCore};
use std::collections::HashSet;

use crate::constants::PIM_ROUNDS;
use crate::scheduler::{Scheduler, VoqCore};
use crate::weighted::WeightedMultimap;
use crate::{DecisionStructure, Error, Message, Tick, Topology, VoqKey};

/// The matching produced by [`maximal_matching`] and the number of rounds it
/// took to produce it.
#[derive(Debug)]
pub struct MatchOutcome {
    pub matching: Vec<VoqKey>,
    pub rounds: usize,
}

/// Runs request/grant/accept rounds over `voqs` until `max_rounds` rounds
/// have run or no schedulable VOQ remains. `max_rounds == 0` runs until the
/// matching is maximal, which takes at most one round per distinct input.
///
/// Per round:
/// 1. every remaining VOQ `(in, out)` is a request by `in` to `out`;
/// 2. every requested output grants one requesting input uniformly;
/// 3. every granted input accepts one granting output uniformly;
/// 4. VOQs sharing an input or output with an accepted edge are invalidated.
///
/// Each round contributes a valid partial matching over terminals no earlier
/// round touched, so the accumulated edge set stays a valid matching.
pub fn maximal_matching<R: Rng + ?Sized>(
    voqs: &HashSet<VoqKey>,
    max_rounds: usize,
    rng: &mut R,
) -> MatchOutcome {
    let mut remaining = voqs.clone();
    let mut matching = Vec::new();
    let mut rounds = 0;
    while !remaining.is_empty() && (max_rounds == 0 || rounds < max_rounds) {
        rounds += 1;

        // request
        let mut requests: WeightedMultimap<NodeIndex, NodeIndex> = WeightedMultimap::new();
        for key in remaining.iter().sorted() {
            requests.insert(key.output, key.input, 1.0);
        }

        // grant
        let mut grants: WeightedMultimap<NodeIndex, NodeIndex> = WeightedMultimap::new();
        for output in requests.keys().copied().sorted() {
            let input = *requests
                .pick(&output, rng)
                .expect("requested outputs have requesters");
            grants.insert(input, output, 1.0);
        }

        // accept
        let mut matched_inputs = HashSet::new();
        let mut matched_outputs = HashSet::new();
        for input in grants.keys().copied().sorted() {
            let output = *grants
                .pick(&input, rng)
                .expect("granted inputs have granters");
            matching.push(VoqKey::new(input, output));
            matched_inputs.insert(input);
            matched_outputs.insert(output);
        }

        // invalidate
        remaining.retain(|key| {
            !matched_inputs.contains(&key.input) && !matched_outputs.contains(&key.output)
        });
    }
    MatchOutcome { matching, rounds }
}

/// The PIM policy: every slot, the eligible VOQs run
/// [`maximal_matching`] with a bounded round count.
pub struct ParallelScheduler {
    core: VoqCore,
    rounds: usize,
}

impl Default for ParallelScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelScheduler {
    pub fn new() -> Self {
        Self::with_rounds(PIM_ROUNDS)
    }

    /// `rounds == 0` runs every slot's matching to maximality.
    pub fn with_rounds(rounds: usize) -> Self {
        Self {
            core: VoqCore::default(),
            rounds,
        }
    }
}

impl Scheduler for ParallelScheduler {
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
        let idle = topo.node(node).borrow().idle_outputs().clone();
        let eligible = self.core.eligible(node, &idle)?;
        if eligible.is_empty() {
            return Ok(());
        }
        let outcome = maximal_matching(&eligible, self.rounds, rng);
        debug!(
            "pim at {} @{}: {} voqs, matched {} in {} round(s)",
            node.index(),
            t,
            eligible.len(),
            outcome.matching.len(),
            outcome.rounds
        );
        self.core.execute(t, node, &outcome.matching, topo)
    }

    fn queued_messages(&self) -> usize {
        self.core.queued_messages()
    }

    fn name(&self) -> &'static str {
        "parallel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn full_voq_set(n: usize) -> HashSet<VoqKey> {
        let mut voqs = HashSet::new();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    voqs.insert(VoqKey::new(NodeIndex::new(i), NodeIndex::new(j)));
                }
            }
        }
        voqs
    }

    fn assert_valid_matching(matching: &[VoqKey]) {
        let inputs: HashSet<_> = matching.iter().map(|k| k.input).collect();
        let outputs: HashSet<_> = matching.iter().map(|k| k.output).collect();
        assert_eq!(inputs.len(), matching.len(), "duplicate input");
        assert_eq!(outputs.len(), matching.len(), "duplicate output");
    }

    #[test]
    fn rounds_accumulate_a_valid_matching() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(17);
        let voqs = full_voq_set(8);
        for rounds in [1, 2, 4] {
            let outcome = maximal_matching(&voqs, rounds, &mut rng);
            assert!(outcome.rounds <= rounds);
            assert_valid_matching(&outcome.matching);
        }
    }

    #[test]
    fn unbounded_rounds_reach_a_maximal_matching() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(23);
        for n in [2, 4, 8, 16] {
            let voqs = full_voq_set(n);
            let outcome = maximal_matching(&voqs, 0, &mut rng);
            assert_valid_matching(&outcome.matching);
            // at least one edge is matched per round
            assert!(outcome.rounds <= n, "n={} rounds={}", n, outcome.rounds);
            // maximal: no unmatched VOQ has both terminals free
            let inputs: HashSet<_> = outcome.matching.iter().map(|k| k.input).collect();
            let outputs: HashSet<_> = outcome.matching.iter().map(|k| k.output).collect();
            for key in &voqs {
                assert!(
                    inputs.contains(&key.input) || outputs.contains(&key.output),
                    "n={} voq {} is still schedulable",
                    n,
                    key
                );
            }
        }
    }

    #[test]
    fn empty_voq_set_matches_nothing() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        let outcome = maximal_matching(&HashSet::new(), 0, &mut rng);
        assert!(outcome.matching.is_empty());
        assert_eq!(outcome.rounds, 0);
    }
}
