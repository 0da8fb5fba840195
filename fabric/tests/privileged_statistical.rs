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

//! The privileged-generator pattern: generator i carries i times the base
//! load. Statistical matching weights its grants by the reserved
//! capacities, so it should beat the FIFO baseline on mean message age
//! here; the assertion is the relative ordering, not absolute values.

use fabric::{
    privileged, FifoScheduler, Network, Scheduler, StatisticalScheduler, TrafficSummary,
    DEFAULT_FABRIC_SIZE,
};

const FRAMES: usize = 10;
const SEED: u64 = 0xCAFE;

fn run(scheduler: Box<dyn Scheduler>) -> Network {
    let mut net = privileged(scheduler, DEFAULT_FABRIC_SIZE, SEED).unwrap();
    net.run(FRAMES).unwrap();
    net
}

#[test]
fn statistical_beats_fifo_on_mean_age() {
    let stat = run(Box::new(StatisticalScheduler::new()));
    let fifo = run(Box::new(FifoScheduler::new()));

    let stat_summary = TrafficSummary::collect(&stat);
    let fifo_summary = TrafficSummary::collect(&fifo);
    assert!(stat_summary.messages > 0);
    assert!(fifo_summary.messages > 0);
    assert!(
        stat_summary.mean_age < fifo_summary.mean_age,
        "statistical mean age {} should undercut fifo's {}",
        stat_summary.mean_age,
        fifo_summary.mean_age
    );
}

#[test]
fn throughput_is_proportional_to_generator_index() {
    let net = run(Box::new(StatisticalScheduler::new()));
    assert_eq!(net.received() + net.in_flight(), net.generated());

    // the bucket rule emits each generator's provisioned load per frame, so
    // observed emission grows with the generator index; with bounded queues
    // (conservation above) the receivers see the same proportions
    let emitted: Vec<usize> = net
        .generator_ids()
        .iter()
        .map(|&id| net.emitted(id))
        .collect();
    let quarter = emitted.len() / 4;
    let low: usize = emitted[..quarter].iter().sum();
    let high: usize = emitted[emitted.len() - quarter..].iter().sum();
    // provisioned ratio is (13+...+16)/(1+...+4) = 5.8; leave slack for the
    // per-frame randomness
    assert!(
        high > low * 3,
        "throughput is not privileged: low {} high {}",
        low,
        high
    );
}
