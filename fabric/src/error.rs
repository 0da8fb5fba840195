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
use std::fmt;

use crate::{Tick, VoqKey};

/// Every error is fatal at the point of occurrence: the simulator is
/// internally consistent or it is broken.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A flow needs at least a source and a sink.
    ShortFlow(usize),
    /// A flow must carry a positive required capacity.
    ZeroCapacity,
    /// A link transmission rate must be positive and divide the frame size.
    InvalidRate(Tick),
    /// No next hop is installed for a `(source, destination)` pair.
    NoRoute(NodeIndex, NodeIndex),
    /// A transmission was requested to a node that is not an output neighbor.
    NotANeighbor(NodeIndex, NodeIndex),
    /// The link to the requested sink is still transmitting.
    LinkBusy(NodeIndex, NodeIndex),
    /// The output port toward the requested sink is not idle.
    PortBusy(NodeIndex, NodeIndex),
    /// A message was delivered to a node that cannot consume it.
    UnexpectedDelivery(NodeIndex),
    /// A matching reused an input terminal.
    DuplicateInput(NodeIndex),
    /// A scheduled VOQ had no message to send.
    EmptyVoq(VoqKey),
    /// The node was never registered with the scheduler.
    UnknownNode(NodeIndex),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ShortFlow(len) => {
                write!(f, "ERROR: flow has {} node(s), needs at least 2", len)
            }
            Self::ZeroCapacity => write!(f, "ERROR: flow capacity must be positive"),
            Self::InvalidRate(rate) => {
                write!(f, "ERROR: rate {} does not divide the frame size", rate)
            }
            Self::NoRoute(src, dst) => {
                write!(
                    f,
                    "ERROR: no next hop for messages from {} to {}",
                    src.index(),
                    dst.index()
                )
            }
            Self::NotANeighbor(node, sink) => {
                write!(
                    f,
                    "ERROR: node {} has no output link to {}",
                    node.index(),
                    sink.index()
                )
            }
            Self::LinkBusy(node, sink) => {
                write!(
                    f,
                    "ERROR: link {} -> {} is still transmitting",
                    node.index(),
                    sink.index()
                )
            }
            Self::PortBusy(node, sink) => {
                write!(
                    f,
                    "ERROR: output port {} -> {} is not idle",
                    node.index(),
                    sink.index()
                )
            }
            Self::UnexpectedDelivery(node) => {
                write!(f, "ERROR: node {} cannot consume messages", node.index())
            }
            Self::DuplicateInput(input) => {
                write!(
                    f,
                    "ERROR: matching reused input terminal {}",
                    input.index()
                )
            }
            Self::EmptyVoq(key) => write!(f, "ERROR: scheduled empty VOQ {}", key),
            Self::UnknownNode(node) => {
                write!(
                    f,
                    "ERROR: node {} is not under this scheduler's domain",
                    node.index()
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
