//! Wrap-aware comparison primitives and the outbound sequence generator
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::Rng;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering as AtomicOrdering};

/// Threshold beyond which a positive/negative 16-bit sequence distance is
/// treated as a wrap rather than genuine reordering.
pub const SEQUENCE_WRAP_THRESHOLD: i32 = 60_000;

/// One-second window (at 90 kHz) used to distinguish ordinary jitter from
/// 32-bit timestamp wraparound.
pub const TIMESTAMP_WINDOW: i64 = 90_000;

/// Compare two 16-bit sequence numbers, wrap-aware.
///
/// Returns `Less` if `a` is earlier than `b`, `Greater` if later, `Equal`
/// if the same. A distance beyond [`SEQUENCE_WRAP_THRESHOLD`] on either
/// side is interpreted as wraparound rather than large forward progress.
pub fn compare_sequence(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let d = a as i32 - b as i32;
    if d > 0 {
        if d >= SEQUENCE_WRAP_THRESHOLD {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    } else if d <= -SEQUENCE_WRAP_THRESHOLD {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Compare two 32-bit RTP timestamps, wrap-aware, assuming a 90 kHz clock.
///
/// Frames arriving out of order are assumed bounded in skew to within one
/// second; a distance beyond [`TIMESTAMP_WINDOW`] samples is interpreted
/// as wraparound.
pub fn compare_timestamp(a: u32, b: u32) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let d = a as i64 - b as i64;
    if d > 0 {
        if d <= TIMESTAMP_WINDOW {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    } else if d <= -TIMESTAMP_WINDOW {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Inclusive wrap-aware distance from sequence `s` to sequence `e`
/// ("how many slots does the range `[s, e]` span").
pub fn inclusive_distance(s: u16, e: u16) -> u32 {
    if s <= e {
        (e - s) as u32 + 1
    } else {
        e as u32 + (65535 - s as u32) + 2
    }
}

/// Monotonic 16-bit outbound sequence generator.
///
/// `next()` is lock-free and thread-safe: concurrent callers always
/// observe distinct values because the increment is a single atomic
/// fetch-add. `round()` (how many times the counter has wrapped through
/// zero) is a plain atomic load, so readers never block a writer in
/// `next()`.
#[derive(Debug)]
pub struct Sequencer {
    seq: AtomicU16,
    round: AtomicU32,
}

impl Sequencer {
    /// Create a sequencer seeded from two independently randomised bytes.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let initial = u16::from_be_bytes([rng.gen(), rng.gen()]);
        Sequencer {
            seq: AtomicU16::new(initial),
            round: AtomicU32::new(0),
        }
    }

    /// Produce the next sequence number, bumping `round` exactly once
    /// for the caller that observes the wrap through zero.
    pub fn next(&self) -> u16 {
        let prev = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        if prev == u16::MAX {
            self.round.fetch_add(1, AtomicOrdering::SeqCst);
        }
        prev.wrapping_add(1)
    }

    /// Number of times the sequence counter has wrapped through zero.
    pub fn round(&self) -> u32 {
        self.round.load(AtomicOrdering::SeqCst)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
