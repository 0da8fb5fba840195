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

//! Predefined traffic patterns: N generators and N receivers around one
//! N x N switch, differing in how capacity is spread across generators.

use crate::constants::SAFE_CAPACITY;
use crate::{Error, Flow, Network, Scheduler};

/// The fabric size the experiments in this crate default to.
pub const DEFAULT_FABRIC_SIZE: usize = 16;

fn fully_connected(
    net: &mut Network,
    size: usize,
    capacity_of: impl Fn(usize) -> u32,
) -> Result<(), Error> {
    let generators: Vec<_> = (0..size).map(|_| net.add_generator()).collect();
    let receivers: Vec<_> = (0..size).map(|_| net.add_receiver()).collect();
    let switch = net.add_switch();
    for (i, &generator) in generators.iter().enumerate() {
        for &receiver in &receivers {
            net.add_flow(Flow::new(
                vec![generator, switch, receiver],
                capacity_of(i),
            )?)?;
        }
    }
    Ok(())
}

/// Every generator sends the same load to every receiver:
/// `SAFE_CAPACITY / size` messages per frame per flow.
pub fn uniform(
    scheduler: Box<dyn Scheduler>,
    size: usize,
    seed: u64,
) -> Result<Network, Error> {
    let mut net = Network::new(scheduler, seed);
    let capacity = SAFE_CAPACITY / size as u32;
    fully_connected(&mut net, size, |_| capacity)?;
    Ok(net)
}

/// Generator `i` (1-indexed) is provisioned `i * p` messages per frame to
/// every receiver, with `p = 2 * SAFE_CAPACITY / (size * (size + 1))`:
/// higher-indexed generators carry proportionally more of the load.
pub fn privileged(
    scheduler: Box<dyn Scheduler>,
    size: usize,
    seed: u64,
) -> Result<Network, Error> {
    let mut net = Network::new(scheduler, seed);
    let p = 2 * SAFE_CAPACITY / (size * (size + 1)) as u32;
    fully_connected(&mut net, size, |i| (i as u32 + 1) * p)?;
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FifoScheduler, VoqKey};

    #[test]
    fn uniform_provisions_equal_capacity() {
        let net = uniform(Box::new(FifoScheduler::new()), 4, 0).unwrap();
        let caps: Vec<_> = net.flows().map(Flow::required_capacity).collect();
        assert_eq!(caps.len(), 16);
        assert!(caps.iter().all(|&c| c == SAFE_CAPACITY / 4));
    }

    #[test]
    fn privileged_provisions_proportional_capacity() {
        let net = privileged(Box::new(FifoScheduler::new()), 4, 0).unwrap();
        let p = 2 * SAFE_CAPACITY / 20;
        for (i, &g) in net.generator_ids().iter().enumerate() {
            for &r in &net.receiver_ids() {
                let flow = net.flow(g, r).expect("flow exists");
                assert_eq!(flow.required_capacity(), (i as u32 + 1) * p);
            }
        }
    }

    #[test]
    fn switch_reservations_sum_the_flows() {
        let size = 4;
        let net = uniform(Box::new(FifoScheduler::new()), size, 0).unwrap();
        let generators = net.generator_ids();
        let receivers = net.receiver_ids();
        // the switch is the only node that is neither
        let switch = net
            .topology()
            .node_ids()
            .find(|id| !generators.contains(id) && !receivers.contains(id))
            .unwrap();
        let ds = net.scheduler().decision_structure(switch).unwrap();
        for &g in &generators {
            for &r in &receivers {
                assert_eq!(
                    ds.reserved_capacity(VoqKey::new(g, r)),
                    SAFE_CAPACITY / size as u32
                );
            }
        }
    }
}
