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

use crate::Error;

/// An ordered sequence of hops from a source to a sink, together with the
/// number of messages per frame provisioned along it. Immutable once
/// constructed.
#[derive(Clone, Debug)]
pub struct Flow {
    path: Vec<NodeIndex>,
    required_capacity: u32,
}

impl Flow {
    pub fn new(path: Vec<NodeIndex>, required_capacity: u32) -> Result<Self, Error> {
        if path.len() < 2 {
            return Err(Error::ShortFlow(path.len()));
        }
        if required_capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(Self {
            path,
            required_capacity,
        })
    }

    pub fn source(&self) -> NodeIndex {
        self.path[0]
    }

    pub fn sink(&self) -> NodeIndex {
        *self.path.last().unwrap()
    }

    /// The `(source, sink)` pair identifying this flow within a network.
    pub fn endpoints(&self) -> (NodeIndex, NodeIndex) {
        (self.source(), self.sink())
    }

    pub fn path(&self) -> &[NodeIndex] {
        &self.path
    }

    /// Messages per frame provisioned along this flow.
    pub fn required_capacity(&self) -> u32 {
        self.required_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_degenerate_flows() {
        let a = NodeIndex::new(0);
        let b = NodeIndex::new(1);
        assert_eq!(Flow::new(vec![], 1).unwrap_err(), Error::ShortFlow(0));
        assert_eq!(Flow::new(vec![a], 1).unwrap_err(), Error::ShortFlow(1));
        assert_eq!(Flow::new(vec![a, b], 0).unwrap_err(), Error::ZeroCapacity);
        let flow = Flow::new(vec![a, b], 3).unwrap();
        assert_eq!(flow.endpoints(), (a, b));
        assert_eq!(flow.required_capacity(), 3);
    }
}
