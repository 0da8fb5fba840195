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

use petgraph::prelude::*;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use crate::weighted::WeightedMultimap;
use crate::{Error, Message, VoqKey};

/// The routing state of one switch: where messages go next, and how much
/// capacity flows have reserved across each (input, output) pair.
///
/// The reservation table doubles as the weighting for statistical matching:
/// per output terminal it holds the VOQ keys using that output, weighted by
/// reserved capacity.
#[derive(Default, Debug)]
pub struct DecisionStructure {
    /// `(flow source, flow destination) -> next hop` at this switch.
    next_hops: HashMap<(NodeIndex, NodeIndex), NodeIndex>,
    /// Output terminal -> VOQ keys using it, weighted by reserved capacity.
    reserved: WeightedMultimap<NodeIndex, VoqKey>,
}

impl DecisionStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next node a message along this flow should travel to. An
    /// undefined lookup is a routing misconfiguration and always fatal.
    pub fn next_hop(&self, msg: &Message) -> Result<NodeIndex, Error> {
        self.next_hops
            .get(&(msg.source(), msg.destination()))
            .copied()
            .ok_or_else(|| Error::NoRoute(msg.source(), msg.destination()))
    }

    pub fn put_decision(
        &mut self,
        source: NodeIndex,
        destination: NodeIndex,
        next_hop: NodeIndex,
    ) {
        self.next_hops.insert((source, destination), next_hop);
    }

    pub fn remove_decision(
        &mut self,
        source: NodeIndex,
        destination: NodeIndex,
    ) -> Option<NodeIndex> {
        self.next_hops.remove(&(source, destination))
    }

    /// The capacity reserved across `voq` by all flows routed through it.
    pub fn reserved_capacity(&self, voq: VoqKey) -> u32 {
        self.reserved.weight(&voq.output, &voq) as u32
    }

    /// Shifts the reservation across `voq` by `delta`. A reservation that
    /// reaches zero is deleted.
    pub fn translate_reserved_capacity(&mut self, voq: VoqKey, delta: i64) {
        let next = self.reserved_capacity(voq) as i64 + delta;
        assert!(next >= 0, "reservation for {} went negative", voq);
        self.set_reserved_capacity(voq, next as u32);
    }

    /// Sets the reservation across `voq`. Zero deletes the entry.
    pub fn set_reserved_capacity(&mut self, voq: VoqKey, amount: u32) {
        if amount == 0 {
            self.reserved.remove(&voq.output, &voq);
        } else {
            self.reserved.insert(voq.output, voq, amount as f64);
        }
    }

    /// Picks an input terminal with probability proportional to the capacity
    /// reserved across `(input, output)`, or `None` if no flow uses `output`.
    pub fn pick_random_input<R: Rng + ?Sized>(
        &self,
        output: NodeIndex,
        rng: &mut R,
    ) -> Option<NodeIndex> {
        self.reserved.pick(&output, rng).map(|voq| voq.input)
    }

    /// Like [`Self::pick_random_input`], but the weighted set is first
    /// intersected with `candidates` (the VOQs with messages waiting).
    /// Returns `None` if the intersection is empty or carries no weight.
    pub fn pick_random_input_among<R: Rng + ?Sized>(
        &self,
        output: NodeIndex,
        rng: &mut R,
        candidates: &HashSet<VoqKey>,
    ) -> Option<NodeIndex> {
        let mut eligible = self.reserved.get(&output)?.clone();
        eligible.retain(|voq| candidates.contains(voq));
        eligible.pick(rng).map(|voq| voq.input)
    }

    /// True when no decisions and no reservations remain.
    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty() && self.reserved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn undefined_next_hop_is_fatal() {
        let mut ds = DecisionStructure::new();
        let msg = Message::new(n(0), n(5), 0);
        assert_eq!(ds.next_hop(&msg).unwrap_err(), Error::NoRoute(n(0), n(5)));
        ds.put_decision(n(0), n(5), n(2));
        assert_eq!(ds.next_hop(&msg).unwrap(), n(2));
        ds.remove_decision(n(0), n(5));
        assert!(ds.next_hop(&msg).is_err());
    }

    #[test]
    fn zero_reservation_deletes_the_entry() {
        let mut ds = DecisionStructure::new();
        let voq = VoqKey::new(n(1), n(2));
        ds.translate_reserved_capacity(voq, 5);
        assert_eq!(ds.reserved_capacity(voq), 5);
        ds.translate_reserved_capacity(voq, -2);
        assert_eq!(ds.reserved_capacity(voq), 3);
        ds.translate_reserved_capacity(voq, -3);
        assert_eq!(ds.reserved_capacity(voq), 0);
        assert!(ds.is_empty());
    }

    #[test]
    fn pick_random_input_weights_by_reservation() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        let mut ds = DecisionStructure::new();
        let out = n(9);
        ds.set_reserved_capacity(VoqKey::new(n(0), out), 1);
        ds.set_reserved_capacity(VoqKey::new(n(1), out), 9);
        let mut hits = [0usize; 2];
        for _ in 0..1000 {
            match ds.pick_random_input(out, &mut rng).unwrap() {
                x if x == n(0) => hits[0] += 1,
                x if x == n(1) => hits[1] += 1,
                _ => unreachable!(),
            }
        }
        assert!(hits[1] > hits[0] * 5, "hits: {:?}", hits);
        // output with no flows
        assert!(ds.pick_random_input(n(3), &mut rng).is_none());
    }

    #[test]
    fn restricted_pick_honors_the_candidate_set() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        let mut ds = DecisionStructure::new();
        let out = n(9);
        ds.set_reserved_capacity(VoqKey::new(n(0), out), 100);
        ds.set_reserved_capacity(VoqKey::new(n(1), out), 1);
        let only_one: HashSet<_> = [VoqKey::new(n(1), out)].into_iter().collect();
        for _ in 0..50 {
            assert_eq!(
                ds.pick_random_input_among(out, &mut rng, &only_one),
                Some(n(1))
            );
        }
        let none: HashSet<VoqKey> = HashSet::new();
        assert_eq!(ds.pick_random_input_among(out, &mut rng, &none), None);
    }
}
