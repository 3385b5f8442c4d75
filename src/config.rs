//! Tunable constants, collected in one place rather than scattered as
//! magic numbers through the crate.
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

use std::time::Duration;

/// Maximum bytes of payload per outbound packet.
pub const DEFAULT_MTU: usize = 1300;

/// Outbound write channel capacity (packets), the only backpressure
/// point between `write_frame` and the transport write pump.
pub const DEFAULT_WRITE_CHANNEL_CAPACITY: usize = 100;

/// Per-stream tunables.
///
/// The wrap-aware comparison windows
/// ([`crate::sequence::SEQUENCE_WRAP_THRESHOLD`],
/// [`crate::sequence::TIMESTAMP_WINDOW`]) are not part of this struct:
/// spec.md §6 presents them as fixed constants of the wire format's
/// wraparound arithmetic, not per-stream knobs, so `compare_sequence`
/// and `compare_timestamp` read them directly rather than through a
/// `Config` value threaded through every call site.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum payload bytes per outbound packet.
    pub mtu: usize,
    /// Bound on the outbound write channel between `write_frame` and the
    /// connection's write pump.
    pub write_channel_capacity: usize,
    /// How long `read_frame` waits for frame completion before returning
    /// whatever has been assembled so far.
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mtu: DEFAULT_MTU,
            write_channel_capacity: DEFAULT_WRITE_CHANNEL_CAPACITY,
            read_timeout: Duration::from_secs(2),
        }
    }
}
