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

//! Virtual output queues.

use petgraph::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::{Error, Message};

/// Identifies a virtual output queue at a switch: the neighbor a message
/// arrived from and the neighbor it will leave toward. The two coordinates
/// are the input and output terminals the queue contends for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoqKey {
    pub input: NodeIndex,
    pub output: NodeIndex,
}

impl VoqKey {
    pub fn new(input: NodeIndex, output: NodeIndex) -> Self {
        Self { input, output }
    }
}

impl fmt::Display for VoqKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} -> {})", self.input.index(), self.output.index())
    }
}

/// The VOQs of one switch. Queues are created lazily on first insert and
/// removed as soon as they drain: the key set always equals the set of
/// non-empty queues.
#[derive(Default, Debug)]
pub struct VoqTable {
    queues: HashMap<VoqKey, VecDeque<Message>>,
}

impl VoqTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, key: VoqKey, msg: Message) {
        self.queues.entry(key).or_default().push_back(msg);
    }

    /// The VOQs with pending messages.
    pub fn available(&self) -> HashSet<VoqKey> {
        self.queues.keys().copied().collect()
    }

    pub fn len(&self, key: VoqKey) -> usize {
        self.queues.get(&key).map_or(0, VecDeque::len)
    }

    pub fn peek(&self, key: VoqKey) -> Option<&Message> {
        self.queues.get(&key).and_then(VecDeque::front)
    }

    /// Removes and returns the head of `key`, dropping the queue when it
    /// empties.
    pub fn pop(&mut self, key: VoqKey) -> Result<Message, Error> {
        let queue = self.queues.get_mut(&key).ok_or(Error::EmptyVoq(key))?;
        let msg = queue.pop_front().expect("empty queues are removed eagerly");
        if queue.is_empty() {
            self.queues.remove(&key);
        }
        Ok(msg)
    }

    /// Messages pending across all queues.
    pub fn total_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
