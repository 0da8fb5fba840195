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

use crate::constants::FRAME_SIZE;
use crate::{Error, Tick};

/// Occupancy bookkeeping for a point-to-point link.
///
/// A link carries one message at a time and takes `rate` time slots per
/// message. Messages in flight are stored as arrival entries at the
/// endpoints, not here.
#[derive(Clone, Debug)]
pub struct Link {
    /// Time slots needed to transmit one message. Must divide the frame size.
    rate: Tick,
    /// The first time slot at which the link is free again.
    busy_until: Tick,
}

impl Link {
    pub fn new(rate: Tick) -> Result<Self, Error> {
        if rate == 0 || FRAME_SIZE % rate != 0 {
            return Err(Error::InvalidRate(rate));
        }
        Ok(Self {
            rate,
            busy_until: 0,
        })
    }

    pub fn rate(&self) -> Tick {
        self.rate
    }

    /// Messages this link can carry per frame.
    pub fn messages_per_frame(&self) -> usize {
        FRAME_SIZE / self.rate
    }

    /// True iff no message occupies the link at the start of slot `t`.
    pub fn can_transmit(&self, t: Tick) -> bool {
        self.busy_until <= t
    }

    /// Begins a transmission at slot `t` and returns its completion slot.
    pub fn transmit(&mut self, t: Tick) -> Tick {
        assert!(self.can_transmit(t), "link is already transmitting");
        self.busy_until = t + self.rate;
        self.busy_until
    }
}
