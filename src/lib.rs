//! RTP reassembly and ordering core.
//!
//! This crate is the transport substrate a media application uses to
//! send and receive timed payloads over RTP: a bit-exact packet codec,
//! per-frame sequence-aware reassembly, a timestamp-ordered frame queue,
//! per-SSRC dispatch, and a connection that multiplexes streams over one
//! transport.
//!
//! Out of scope: the datagram socket itself (only a [`connection::Transport`]
//! contract is consumed), payload codecs, retransmission, FEC, RTCP,
//! SRTP, and playout-timing jitter buffering. This core orders and
//! assembles; it does not schedule playout against a wall clock.
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

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod frame_queue;
pub mod packet;
pub mod packet_list;
pub mod sequence;
pub mod stream;

pub use config::Config;
pub use connection::{Connection, Transport};
pub use error::{DecodeError, Result, RtpError};
pub use frame::{Frame, PushError};
pub use frame_queue::{FrameQueue, FrameWaitQueue};
pub use packet::{Extension, Packet};
pub use packet_list::{Cursor, InsertOutcome, PacketList};
pub use sequence::{compare_sequence, compare_timestamp, Sequencer};
pub use stream::Stream;
