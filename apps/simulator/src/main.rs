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

//! Runs each scheduling policy over the predefined traffic patterns and
//! prints the delivery statistics.

use env_logger::Target;
use structopt::StructOpt;

use fabric::{
    privileged, uniform, FifoScheduler, Network, ParallelScheduler, Scheduler,
    StatisticalScheduler, TrafficSummary, DEFAULT_FABRIC_SIZE,
};

#[derive(StructOpt)]
#[structopt(name = "simulator", about = "Crossbar switch-scheduling experiments")]
struct Arguments {
    /// frames to simulate per run
    #[structopt(short, long, default_value = "250")]
    frames: usize,
    /// generators (and receivers) around the switch
    #[structopt(short, long, default_value = "16")]
    size: usize,
    /// RNG seed shared by every run
    #[structopt(long, default_value = "381779276")]
    seed: u64,
    /// supported patterns: uniform, privileged, both
    #[structopt(short, long, default_value = "both")]
    pattern: String,
}

fn scheduler_named(name: &str) -> Box<dyn Scheduler> {
    match name {
        "fifo" => Box::new(FifoScheduler::new()),
        "parallel" => Box::new(ParallelScheduler::new()),
        "statistical" => Box::new(StatisticalScheduler::new()),
        _ => unreachable!(),
    }
}

fn build(pattern: &str, scheduler: Box<dyn Scheduler>, size: usize, seed: u64) -> Network {
    match pattern {
        "uniform" => uniform(scheduler, size, seed),
        "privileged" => privileged(scheduler, size, seed),
        _ => unreachable!(),
    }
    .expect("pattern construction failed")
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::from_args();
    env_logger::builder().target(Target::Stderr).init();

    let patterns: Vec<&str> = match args.pattern.as_str() {
        "both" => vec!["uniform", "privileged"],
        "uniform" => vec!["uniform"],
        "privileged" => vec!["privileged"],
        other => anyhow::bail!("unknown pattern {:?}", other),
    };
    let size = if args.size == 0 {
        DEFAULT_FABRIC_SIZE
    } else {
        args.size
    };

    for pattern in patterns {
        for policy in ["fifo", "parallel", "statistical"] {
            println!("========================");
            println!("{} network with the {} scheduler", pattern, policy);
            let mut network = build(pattern, scheduler_named(policy), size, args.seed);
            log::trace!("topology:\n{}", network.topology().to_graphviz());
            network.run(args.frames)?;
            let summary = TrafficSummary::collect(&network);
            println!("{}", summary);
            log::info!(
                "{}/{}: generated {}, delivered {}, in flight {}",
                pattern,
                policy,
                network.generated(),
                network.received(),
                network.in_flight()
            );
        }
    }
    Ok(())
}
