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

//! Measures how many request/grant/accept rounds parallel iterative
//! matching needs to reach a maximal matching on fully loaded N x N
//! switches, and writes the raw trial data as an Octave script.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use structopt::StructOpt;

use fabric::{maximal_matching, NodeIndex, VoqKey};

#[derive(StructOpt)]
#[structopt(
    name = "maximal_iterations",
    about = "Rounds-to-maximal for parallel iterative matching"
)]
struct Arguments {
    /// trials per switch size
    #[structopt(short, long, default_value = "1000")]
    trials: usize,
    /// RNG seed
    #[structopt(long, default_value = "2166136261")]
    seed: u64,
    /// where to write the Octave data
    #[structopt(short, long, default_value = "data/maximal_testing.m")]
    output: PathBuf,
}

const TESTED_SIZES: [usize; 7] = [4, 8, 16, 32, 64, 128, 256];

/// Every (input, output) pair of an N x N switch with distinct terminals.
fn full_voq_set(n: usize) -> HashSet<VoqKey> {
    let mut voqs = HashSet::new();
    for i in 0..n {
        for j in 0..n {
            if i != j {
                voqs.insert(VoqKey::new(NodeIndex::new(i), NodeIndex::new(j)));
            }
        }
    }
    voqs
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::from_args();
    env_logger::init();
    let mut rng = Xoshiro256StarStar::seed_from_u64(args.seed);

    if let Some(dir) = args.output.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(&args.output)?);

    write!(out, "testedN = [")?;
    for (i, n) in TESTED_SIZES.iter().enumerate() {
        if i > 0 {
            write!(out, ",")?;
        }
        write!(out, "{}", n)?;
    }
    writeln!(out, "];")?;

    writeln!(out, "testData = [")?;
    for &n in &TESTED_SIZES {
        let voqs = full_voq_set(n);
        let mut total_rounds = 0usize;
        write!(out, "[")?;
        for trial in 0..args.trials {
            let outcome = maximal_matching(&voqs, 0, &mut rng);
            total_rounds += outcome.rounds;
            if trial > 0 {
                write!(out, ",")?;
            }
            write!(out, "{}", outcome.rounds)?;
        }
        writeln!(out, "];...")?;

        let mean = total_rounds as f64 / args.trials as f64;
        println!(
            "average rounds to a maximal matching ({} by {}): {:.2}",
            n, n, mean
        );
        log::info!("n={} mean={:.3}", n, mean);
    }
    writeln!(out, "];")?;
    Ok(())
}
