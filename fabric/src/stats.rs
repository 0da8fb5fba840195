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

//! Aggregate statistics over the messages receivers have recorded.

use itertools::Itertools;
use petgraph::prelude::*;
use std::fmt;

use crate::{Network, Tick};

/// Delivery statistics across all receivers of a network.
///
/// The disparity of a receiver is the gap between consecutive arrival slots;
/// its mean approximates `FRAME_SIZE / (messages per frame)` for a receiver
/// at steady state.
#[derive(Debug, Clone)]
pub struct TrafficSummary {
    pub messages: usize,
    pub mean_age: f64,
    pub min_age: Option<Tick>,
    pub max_age: Option<Tick>,
    pub mean_disparity: f64,
    pub per_receiver_disparity: Vec<(NodeIndex, f64)>,
}

impl TrafficSummary {
    pub fn collect(network: &Network) -> Self {
        let mut messages = 0usize;
        let mut age_sum = 0u128;
        let mut min_age = None;
        let mut max_age = None;
        let mut disparity_sum = 0u128;
        let mut disparity_count = 0usize;
        let mut per_receiver_disparity = Vec::new();

        for id in network.receiver_ids().into_iter().sorted() {
            let deliveries = network.deliveries(id);
            messages += deliveries.len();
            for d in &deliveries {
                age_sum += d.age as u128;
                min_age = Some(min_age.map_or(d.age, |m: Tick| m.min(d.age)));
                max_age = Some(max_age.map_or(d.age, |m: Tick| m.max(d.age)));
            }
            let gaps: Vec<Tick> = deliveries
                .windows(2)
                .map(|w| w[1].arrival - w[0].arrival)
                .collect();
            let local_sum: u128 = gaps.iter().map(|&g| g as u128).sum();
            let local_mean = if gaps.is_empty() {
                0.0
            } else {
                local_sum as f64 / gaps.len() as f64
            };
            per_receiver_disparity.push((id, local_mean));
            disparity_sum += local_sum;
            disparity_count += gaps.len();
        }

        Self {
            messages,
            mean_age: if messages == 0 {
                0.0
            } else {
                age_sum as f64 / messages as f64
            },
            min_age,
            max_age,
            mean_disparity: if disparity_count == 0 {
                0.0
            } else {
                disparity_sum as f64 / disparity_count as f64
            },
            per_receiver_disparity,
        }
    }
}

impl fmt::Display for TrafficSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "messages received: {}", self.messages)?;
        writeln!(f, "mean age: {:.2}", self.mean_age)?;
        writeln!(
            f,
            "(min age, max age): [{}, {}]",
            self.min_age.map_or_else(|| "-".to_string(), |a| a.to_string()),
            self.max_age.map_or_else(|| "-".to_string(), |a| a.to_string()),
        )?;
        writeln!(f, "mean arrival disparity: {:.2}", self.mean_disparity)?;
        write!(f, "per-receiver disparity: [")?;
        for (i, (id, disparity)) in self.per_receiver_disparity.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:.2}", id.index(), disparity)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Flow, Message, ParallelScheduler};

    #[test]
    fn summary_over_a_drained_line() {
        let mut net = crate::Network::new(Box::new(ParallelScheduler::new()), 0);
        let g = net.add_switch();
        let s = net.add_switch();
        let r = net.add_receiver();
        net.add_flow(Flow::new(vec![g, s, r], 1).unwrap()).unwrap();
        for created in 0..3 {
            net.inject(0, g, Message::new(g, r, created)).unwrap();
        }
        net.run_ticks(8).unwrap();

        let summary = TrafficSummary::collect(&net);
        assert_eq!(summary.messages, 3);
        // in-order delivery one slot apart: constant age, unit disparity
        assert_eq!(summary.min_age, summary.max_age);
        assert!((summary.mean_disparity - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.per_receiver_disparity.len(), 1);
    }

    #[test]
    fn summary_of_an_idle_network_is_empty() {
        let mut net = crate::Network::new(Box::new(ParallelScheduler::new()), 0);
        net.add_receiver();
        net.run_ticks(5).unwrap();
        let summary = TrafficSummary::collect(&net);
        assert_eq!(summary.messages, 0);
        assert_eq!(summary.min_age, None);
        assert_eq!(summary.mean_age, 0.0);
    }
}
