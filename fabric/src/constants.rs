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

//! Simulation constants shared across the crate.

use crate::Tick;

/// The number of contiguous time slots that form a single frame. Flow rates
/// are expressed in messages per frame, and link transmission rates must
/// divide this value.
pub const FRAME_SIZE: Tick = 1000;

/// The largest per-port capacity (messages per frame) that the traffic
/// patterns provision, 53% of a frame.
pub const SAFE_CAPACITY: u32 = (FRAME_SIZE as u32) * 53 / 100;

/// The default number of request/grant/accept rounds run by parallel
/// iterative matching. Zero means "run until the matching is maximal".
pub const PIM_ROUNDS: usize = 4;

/// The number of capacity-weighted rounds run by statistical matching.
pub const STAT_ROUNDS: usize = 1;

/// The number of parallel iterative matching rounds statistical matching
/// runs over the residual VOQs after its weighted rounds.
pub const STAT_PIM_ROUNDS: usize = 3;
