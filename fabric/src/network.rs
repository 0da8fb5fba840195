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

//! A network of nodes driven by a single scheduler, and the tick engine.

use log::{info, trace};
use petgraph::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::HashMap;

use crate::constants::FRAME_SIZE;
use crate::node::{Delivery, Generator, NodeKind, Receiver};
use crate::weighted::WeightedMultimap;
use crate::{DecisionStructure, Error, Flow, Message, Scheduler, Tick, Topology, VoqKey};

/// The `(source, sink)` pair identifying a flow; unique per network.
pub type FlowKey = (NodeIndex, NodeIndex);

/// A node-oriented network: the topology, the flows routed over it, one
/// scheduler shared by every node, and one seeded RNG threaded through
/// generators and policies.
///
/// Nodes and flows are wired up before [`Network::run`]; neither is created
/// nor destroyed while the simulation runs.
pub struct Network {
    topo: Topology,
    scheduler: Box<dyn Scheduler>,
    flows: HashMap<FlowKey, Flow>,
    /// Per generator, the flows it roots, weighted by required capacity.
    flows_from: WeightedMultimap<NodeIndex, FlowKey>,
    order: Vec<NodeIndex>,
    rng: Xoshiro256StarStar,
    elapsed: Tick,
}

impl Network {
    pub fn new(scheduler: Box<dyn Scheduler>, seed: u64) -> Self {
        Self {
            topo: Topology::new(),
            scheduler,
            flows: HashMap::new(),
            flows_from: WeightedMultimap::new(),
            order: Vec::new(),
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            elapsed: 0,
        }
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeIndex {
        let id = self.topo.add_node(kind);
        self.scheduler.register(id);
        self.order.push(id);
        id
    }

    pub fn add_generator(&mut self) -> NodeIndex {
        self.add_node(NodeKind::Generator(Generator::default()))
    }

    pub fn add_receiver(&mut self) -> NodeIndex {
        self.add_node(NodeKind::Receiver(Receiver::default()))
    }

    pub fn add_switch(&mut self) -> NodeIndex {
        self.add_node(NodeKind::Switch)
    }

    pub fn add_link(
        &mut self,
        source: NodeIndex,
        sink: NodeIndex,
        rate: Tick,
    ) -> Result<EdgeIndex, Error> {
        self.topo.add_link(source, sink, rate)
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn scheduler_mut(&mut self) -> &mut dyn Scheduler {
        self.scheduler.as_mut()
    }

    pub fn flow(&self, source: NodeIndex, sink: NodeIndex) -> Option<&Flow> {
        self.flows.get(&(source, sink))
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }

    /// Routes `flow` through the network: creates any missing link along its
    /// path (unit rate), installs a next-hop decision at every node but the
    /// sink, and reserves the flow's capacity across each
    /// `(previous hop, next hop)` pair. A flow with the same endpoints is
    /// replaced.
    pub fn add_flow(&mut self, flow: Flow) -> Result<(), Error> {
        let (source, sink) = flow.endpoints();
        if self.flows.contains_key(&(source, sink)) {
            self.remove_flow(source, sink)?;
        }
        for hop in flow.path().windows(2) {
            self.topo.ensure_link(hop[0], hop[1], 1)?;
        }
        let capacity = flow.required_capacity();
        self.walk_flow(&flow, |ds, src, dst, next, voq| {
            ds.put_decision(src, dst, next);
            ds.translate_reserved_capacity(voq, capacity as i64);
        })?;
        self.flows_from.insert(source, (source, sink), capacity as f64);
        self.flows.insert((source, sink), flow);
        Ok(())
    }

    /// Reverses [`Network::add_flow`] exactly: decisions come out and
    /// reserved capacities are translated back down, so adding and removing
    /// a flow leaves every decision structure as it was. Removing an unknown
    /// flow is a no-op.
    pub fn remove_flow(&mut self, source: NodeIndex, sink: NodeIndex) -> Result<(), Error> {
        let Some(flow) = self.flows.remove(&(source, sink)) else {
            return Ok(());
        };
        let capacity = flow.required_capacity();
        self.walk_flow(&flow, |ds, src, dst, _next, voq| {
            ds.remove_decision(src, dst);
            ds.translate_reserved_capacity(voq, -(capacity as i64));
        })?;
        self.flows_from.remove(&source, &(source, sink));
        Ok(())
    }

    /// Visits every forwarding node of `flow` with its decision structure,
    /// the flow endpoints, the node's next hop, and the `(previous hop,
    /// next hop)` VOQ contended at that node. At the source the previous hop
    /// is the source itself.
    fn walk_flow(
        &mut self,
        flow: &Flow,
        mut visit: impl FnMut(&mut DecisionStructure, NodeIndex, NodeIndex, NodeIndex, VoqKey),
    ) -> Result<(), Error> {
        let (source, sink) = flow.endpoints();
        let path = flow.path();
        for i in 0..path.len() - 1 {
            let node = path[i];
            let next = path[i + 1];
            let previous = if i == 0 { node } else { path[i - 1] };
            let ds = self.scheduler.decision_structure_mut(node)?;
            visit(ds, source, sink, next, VoqKey::new(previous, next));
        }
        Ok(())
    }

    /// Queues a freshly created message at its creator, as generators do.
    /// Exposed so tests and custom drivers can inject bursts.
    pub fn inject(&mut self, t: Tick, node: NodeIndex, msg: Message) -> Result<(), Error> {
        if let NodeKind::Generator(g) = self.topo.node(node).borrow_mut().kind_mut() {
            g.emitted += 1;
        }
        self.scheduler.enqueue(t, node, node, msg)
    }

    /// Ticks the network for `frames` frames.
    pub fn run(&mut self, frames: usize) -> Result<(), Error> {
        self.run_ticks(frames * FRAME_SIZE)
    }

    /// Ticks the network `ticks` times, continuing from where the previous
    /// run stopped. Nodes are visited in creation order within each slot.
    pub fn run_ticks(&mut self, ticks: Tick) -> Result<(), Error> {
        info!(
            "running {} slot(s) over {} node(s) under the {} scheduler",
            ticks,
            self.order.len(),
            self.scheduler.name()
        );
        let order = self.order.clone();
        for i in 0..ticks {
            let t = self.elapsed + i;
            for &id in &order {
                self.tick_node(t, id)?;
            }
        }
        self.elapsed += ticks;
        Ok(())
    }

    /// Slots simulated so far.
    pub fn elapsed(&self) -> Tick {
        self.elapsed
    }

    /// One node, one slot, in the normative phase order: idle-port refresh,
    /// arrival drain, traffic generation, outbound send.
    fn tick_node(&mut self, t: Tick, id: NodeIndex) -> Result<(), Error> {
        let arrivals = {
            let mut node = self.topo.node(id).borrow_mut();
            node.refresh_idle(t);
            node.drain_arrivals(t)
        };
        for (from, msg) in arrivals {
            if msg.destination() == id {
                self.deliver(t, id, msg)?;
            } else {
                self.scheduler.enqueue(t, from, id, msg)?;
            }
        }
        self.generate(t, id)?;
        self.scheduler.schedule(t, id, &self.topo, &mut self.rng)
    }

    fn deliver(&self, t: Tick, id: NodeIndex, msg: Message) -> Result<(), Error> {
        match self.topo.node(id).borrow_mut().kind_mut() {
            NodeKind::Receiver(receiver) => {
                trace!("{} delivered at {} @{}", msg, id.index(), t);
                receiver.record(t, &msg);
                Ok(())
            }
            _ => Err(Error::UnexpectedDelivery(id)),
        }
    }

    /// The probabilistic bucket rule. At each frame start a generator
    /// reloads its bucket with `(flow, required capacity)`; on a slot with
    /// `time_left` slots remaining and `msgs_left` messages still owed it
    /// emits with probability `msgs_left / time_left`, choosing the flow
    /// weighted by its remaining count.
    fn generate(&mut self, t: Tick, id: NodeIndex) -> Result<(), Error> {
        let msg = {
            let mut node = self.topo.node(id).borrow_mut();
            let NodeKind::Generator(g) = node.kind_mut() else {
                return Ok(());
            };
            if t % FRAME_SIZE == 0 {
                g.reload(self.flows_from.get(&id));
            }
            let time_left = FRAME_SIZE - (t % FRAME_SIZE);
            let msgs_left = g.bucket.total().round() as usize;
            if msgs_left == 0 || self.rng.gen_range(0..time_left) >= msgs_left {
                return Ok(());
            }
            let Some(&(source, sink)) = g.bucket.pick(&mut self.rng) else {
                return Ok(());
            };
            let left = g.bucket.weight(&(source, sink));
            g.bucket.add((source, sink), left - 1.0);
            g.emitted += 1;
            Message::new(source, sink, t)
        };
        trace!("generator {} emits {}", id.index(), msg);
        self.scheduler.enqueue(t, id, id, msg)
    }

    // Accounting used by the statistics and the conservation checks.

    pub fn generator_ids(&self) -> Vec<NodeIndex> {
        self.ids_of(|kind| matches!(kind, NodeKind::Generator(_)))
    }

    pub fn receiver_ids(&self) -> Vec<NodeIndex> {
        self.ids_of(|kind| matches!(kind, NodeKind::Receiver(_)))
    }

    fn ids_of(&self, mut pred: impl FnMut(&NodeKind) -> bool) -> Vec<NodeIndex> {
        self.topo
            .node_ids()
            .filter(|&id| pred(self.topo.node(id).borrow().kind()))
            .collect()
    }

    /// The deliveries recorded at `id`; empty for non-receivers.
    pub fn deliveries(&self, id: NodeIndex) -> Vec<Delivery> {
        match self.topo.node(id).borrow().kind() {
            NodeKind::Receiver(receiver) => receiver.deliveries().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Messages created by the generator `id`; zero for other kinds.
    pub fn emitted(&self, id: NodeIndex) -> usize {
        match self.topo.node(id).borrow().kind() {
            NodeKind::Generator(g) => g.emitted(),
            _ => 0,
        }
    }

    /// Messages created by all generators so far.
    pub fn generated(&self) -> usize {
        self.topo
            .node_ids()
            .map(|id| match self.topo.node(id).borrow().kind() {
                NodeKind::Generator(g) => g.emitted(),
                _ => 0,
            })
            .sum()
    }

    /// Messages delivered to all receivers so far.
    pub fn received(&self) -> usize {
        self.topo
            .node_ids()
            .map(|id| match self.topo.node(id).borrow().kind() {
                NodeKind::Receiver(r) => r.deliveries().len(),
                _ => 0,
            })
            .sum()
    }

    /// Messages neither delivered nor dropped: queued at a scheduler or
    /// still on the wire. Conservation means
    /// `generated() == received() + in_flight()` after every slot.
    pub fn in_flight(&self) -> usize {
        self.topo.in_flight() + self.scheduler.queued_messages()
    }
}
