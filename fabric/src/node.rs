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

//! The per-node substrate and the topology that connects nodes.
//!
//! A node tracks which of its output ports are idle, which outbound
//! transmissions are still completing, and which inbound messages are still
//! on the wire. The topology is a directed graph whose node weights are the
//! per-node substrate and whose edge weights are links; graph adjacency is
//! the single authoritative record of which links exist.

use log::trace;
use petgraph::graph::DiGraph;
use petgraph::prelude::*;
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use crate::weighted::WeightedSet;
use crate::{Error, Link, Message, Tick};

/// A message completing its transmission toward this node at `tick`.
/// Ordered by `(tick, seq)`; the sequence number makes same-slot arrivals
/// drain in insertion order.
#[derive(Clone, Debug)]
struct ArrivalEntry {
    tick: Tick,
    seq: u64,
    from: NodeIndex,
    msg: Message,
}

impl PartialEq for ArrivalEntry {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.seq == other.seq
    }
}

impl Eq for ArrivalEntry {}

impl PartialOrd for ArrivalEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArrivalEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tick, self.seq).cmp(&(other.tick, other.seq))
    }
}

/// An outbound transmission of this node completing at `tick`; the port
/// toward `sink` becomes idle again at that slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CompletionEntry {
    tick: Tick,
    seq: u64,
    sink: NodeIndex,
}

impl PartialOrd for CompletionEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompletionEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tick, self.seq).cmp(&(other.tick, other.seq))
    }
}

/// A message delivered to a receiver.
#[derive(Clone, Copy, Debug)]
pub struct Delivery {
    /// Slots between creation and delivery.
    pub age: Tick,
    /// The slot the message was delivered in.
    pub arrival: Tick,
}

/// Traffic-source state: the flows this node still owes messages for in the
/// current frame, weighted by the remaining count.
#[derive(Default, Debug)]
pub struct Generator {
    pub(crate) bucket: WeightedSet<(NodeIndex, NodeIndex)>,
    pub(crate) emitted: usize,
}

impl Generator {
    /// Reloads the per-frame bucket from the flows rooted at this node.
    pub(crate) fn reload(&mut self, flows: Option<&WeightedSet<(NodeIndex, NodeIndex)>>) {
        self.bucket = flows.cloned().unwrap_or_default();
    }

    /// Messages emitted since construction.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// Traffic-sink state: one record per delivered message.
#[derive(Default, Debug)]
pub struct Receiver {
    deliveries: Vec<Delivery>,
}

impl Receiver {
    pub(crate) fn record(&mut self, t: Tick, msg: &Message) {
        self.deliveries.push(Delivery {
            age: msg.age(t),
            arrival: t,
        });
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }
}

/// What a node does with traffic beyond forwarding it.
#[derive(Debug)]
pub enum NodeKind {
    /// Creates messages; receiving one is an error.
    Generator(Generator),
    /// Consumes messages addressed to it.
    Receiver(Receiver),
    /// Forwards only; receiving a message addressed to it is an error.
    Switch,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generator(_) => "generator",
            Self::Receiver(_) => "receiver",
            Self::Switch => "switch",
        }
    }
}

/// Per-node bookkeeping shared by every node kind.
#[derive(Debug)]
pub struct NodeCore {
    kind: NodeKind,
    /// Output ports able to begin a transmission this slot. A port is either
    /// here or has exactly one entry in `completions`.
    idle_outputs: HashSet<NodeIndex>,
    arrivals: BinaryHeap<Reverse<ArrivalEntry>>,
    completions: BinaryHeap<Reverse<CompletionEntry>>,
    arrival_seq: u64,
    completion_seq: u64,
}

impl NodeCore {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            idle_outputs: HashSet::new(),
            arrivals: BinaryHeap::new(),
            completions: BinaryHeap::new(),
            arrival_seq: 0,
            completion_seq: 0,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn idle_outputs(&self) -> &HashSet<NodeIndex> {
        &self.idle_outputs
    }

    /// Phase 1 of a tick: ports whose transmissions completed by `t` become
    /// idle again.
    pub fn refresh_idle(&mut self, t: Tick) {
        while let Some(Reverse(entry)) = self.completions.peek() {
            if entry.tick > t {
                break;
            }
            self.idle_outputs.insert(entry.sink);
            self.completions.pop();
        }
    }

    /// Phase 2 of a tick: messages whose transmission completed by `t`, in
    /// completion order with ties broken by insertion order.
    pub fn drain_arrivals(&mut self, t: Tick) -> Vec<(NodeIndex, Message)> {
        let mut drained = Vec::new();
        while let Some(Reverse(entry)) = self.arrivals.peek() {
            if entry.tick > t {
                break;
            }
            drained.push((entry.from, entry.msg));
            self.arrivals.pop();
        }
        drained
    }

    pub(crate) fn push_arrival(&mut self, tick: Tick, from: NodeIndex, msg: Message) {
        let seq = self.arrival_seq;
        self.arrival_seq += 1;
        self.arrivals.push(Reverse(ArrivalEntry {
            tick,
            seq,
            from,
            msg,
        }));
    }

    fn push_completion(&mut self, tick: Tick, sink: NodeIndex) {
        let seq = self.completion_seq;
        self.completion_seq += 1;
        self.completions.push(Reverse(CompletionEntry { tick, seq, sink }));
    }

    /// Inbound messages still on the wire.
    pub fn pending_arrivals(&self) -> usize {
        self.arrivals.len()
    }
}

/// The node graph. Node weights sit behind `RefCell` so the tick engine can
/// mutate one node while reading the graph structure.
#[derive(Default)]
pub struct Topology {
    graph: DiGraph<RefCell<NodeCore>, RefCell<Link>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeIndex {
        self.graph.add_node(RefCell::new(NodeCore::new(kind)))
    }

    pub fn node(&self, id: NodeIndex) -> &RefCell<NodeCore> {
        &self.graph[id]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn has_link(&self, source: NodeIndex, sink: NodeIndex) -> bool {
        self.graph.find_edge(source, sink).is_some()
    }

    /// Wires a link and marks the new output port idle at the source.
    pub fn add_link(
        &mut self,
        source: NodeIndex,
        sink: NodeIndex,
        rate: Tick,
    ) -> Result<EdgeIndex, Error> {
        assert_ne!(source, sink, "links must connect distinct nodes");
        let link = Link::new(rate)?;
        let edge = self.graph.add_edge(source, sink, RefCell::new(link));
        self.graph[source].borrow_mut().idle_outputs.insert(sink);
        Ok(edge)
    }

    /// Wires a link unless one already exists.
    pub fn ensure_link(
        &mut self,
        source: NodeIndex,
        sink: NodeIndex,
        rate: Tick,
    ) -> Result<EdgeIndex, Error> {
        match self.graph.find_edge(source, sink) {
            Some(edge) => Ok(edge),
            None => self.add_link(source, sink, rate),
        }
    }

    /// Begins transmitting `msg` from `source` to `sink` at slot `t`:
    /// occupies the link, retires the output port until the completion slot,
    /// and posts the arrival on the sink.
    pub fn transmit(
        &self,
        t: Tick,
        source: NodeIndex,
        sink: NodeIndex,
        msg: Message,
    ) -> Result<(), Error> {
        let edge = self
            .graph
            .find_edge(source, sink)
            .ok_or(Error::NotANeighbor(source, sink))?;
        let mut link = self.graph[edge].borrow_mut();
        let mut src = self.graph[source].borrow_mut();
        if !link.can_transmit(t) {
            return Err(Error::LinkBusy(source, sink));
        }
        if !src.idle_outputs.remove(&sink) {
            return Err(Error::PortBusy(source, sink));
        }
        let done = link.transmit(t);
        src.push_completion(done, sink);
        drop(src);
        drop(link);
        self.graph[sink].borrow_mut().push_arrival(done, source, msg);
        trace!(
            "transmit {} via {} -> {}, completes @{}",
            msg,
            source.index(),
            sink.index(),
            done
        );
        Ok(())
    }

    /// Graphviz rendering, for debugging wiring problems.
    pub fn to_graphviz(&self) -> String {
        let labeled = self.graph.map(
            |id, node| format!("{} {}", node.borrow().kind().label(), id.index()),
            |_, link| link.borrow().rate(),
        );
        format!("{}", petgraph::dot::Dot::new(&labeled))
    }

    /// Messages on the wire across the whole topology.
    pub fn in_flight(&self) -> usize {
        self.graph
            .node_indices()
            .map(|id| self.graph[id].borrow().pending_arrivals())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> (Topology, NodeIndex, NodeIndex) {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeKind::Switch);
        let b = topo.add_node(NodeKind::Switch);
        topo.add_link(a, b, 2).unwrap();
        (topo, a, b)
    }

    #[test]
    fn transmit_round_trips_port_state() {
        let (topo, a, b) = two_nodes();
        assert!(topo.node(a).borrow().idle_outputs().contains(&b));

        let msg = Message::new(a, b, 0);
        topo.transmit(0, a, b, msg).unwrap();
        assert!(!topo.node(a).borrow().idle_outputs().contains(&b));
        assert_eq!(topo.in_flight(), 1);

        // busy port: both the port and the link refuse
        assert_eq!(
            topo.transmit(1, a, b, msg).unwrap_err(),
            Error::LinkBusy(a, b)
        );

        // at the completion slot the port is idle again and the arrival is
        // visible at the sink
        topo.node(a).borrow_mut().refresh_idle(2);
        assert!(topo.node(a).borrow().idle_outputs().contains(&b));
        let drained = topo.node(b).borrow_mut().drain_arrivals(2);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, a);
    }

    #[test]
    fn transmit_to_non_neighbor_is_a_routing_error() {
        let (topo, a, _) = two_nodes();
        let mut topo = topo;
        let c = topo.add_node(NodeKind::Switch);
        assert_eq!(
            topo.transmit(0, a, c, Message::new(a, c, 0)).unwrap_err(),
            Error::NotANeighbor(a, c)
        );
    }

    #[test]
    fn arrivals_drain_in_completion_order_with_stable_ties() {
        let mut topo = Topology::new();
        let a = topo.add_node(NodeKind::Switch);
        let b = topo.add_node(NodeKind::Switch);
        let mut node = topo.node(a).borrow_mut();
        node.push_arrival(5, b, Message::new(b, a, 3));
        node.push_arrival(2, b, Message::new(b, a, 0));
        node.push_arrival(5, b, Message::new(b, a, 4));
        node.push_arrival(2, b, Message::new(b, a, 1));

        // nothing before its completion slot
        assert!(node.drain_arrivals(1).is_empty());
        let first = node.drain_arrivals(2);
        assert_eq!(
            first.iter().map(|(_, m)| m.created()).collect::<Vec<_>>(),
            vec![0, 1]
        );
        let rest = node.drain_arrivals(10);
        assert_eq!(
            rest.iter().map(|(_, m)| m.created()).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }
}
