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

use crate::Tick;

/// A message traveling through the network: the node that created it, the
/// node it is for, and the time slot it was created in. Immutable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    source: NodeIndex,
    destination: NodeIndex,
    created: Tick,
}

impl Message {
    pub fn new(source: NodeIndex, destination: NodeIndex, created: Tick) -> Self {
        Self {
            source,
            destination,
            created,
        }
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn destination(&self) -> NodeIndex {
        self.destination
    }

    pub fn created(&self) -> Tick {
        self.created
    }

    /// Time slots elapsed since creation.
    pub fn age(&self, now: Tick) -> Tick {
        now - self.created
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "msg {} -> {} @{}",
            self.source.index(),
            self.destination.index(),
            self.created
        )
    }
}
