//! A frame: every packet sharing one RTP timestamp, plus the linkage to
//! the previous frame that lets completion be detected without relying
//! on wall-clock timing.
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

use crate::packet::Packet;
use crate::packet_list::{InsertOutcome, PacketList};
use crate::sequence::compare_timestamp;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::sync::oneshot;

/// Rejections [`Frame::push`] can return. Note there is no "nil packet"
/// variant: a `Packet` is always an owned value in this API, so the
/// source system's null-packet rejection has no analogue here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The packet's timestamp doesn't belong to this frame, or arrives
    /// out of order with respect to the preceding frame.
    #[error("timestamp invalid for this frame")]
    TimestampInvalid,

    /// The frame is already full; any further push is rejected
    /// regardless of sequence continuity with the previous frame.
    #[error("frame is already full")]
    FrameFull,

    /// A packet with this sequence number is already in the frame.
    #[error("packet duplicated")]
    PacketDuplicated,
}

/// One frame: all packets sharing a single RTP timestamp on one SSRC.
///
/// Always held behind `Arc`: the stream's by-timestamp map and the
/// frame queue both reference the same frame, and `prev_frame` is a
/// non-owning [`Weak`] back-reference so that once both owners release a
/// predecessor it is freed rather than kept alive by a chain of strong
/// links (see spec §9).
pub struct Frame {
    timestamp: u32,
    ssrc: u32,
    list: Mutex<PacketList>,
    prev_frame: Mutex<Weak<Frame>>,
    done_tx: Mutex<Option<oneshot::Sender<()>>>,
    done_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl Frame {
    /// Create a new, empty frame for `timestamp` on `ssrc`.
    pub fn new(timestamp: u32, ssrc: u32) -> Arc<Frame> {
        let (tx, rx) = oneshot::channel();
        Arc::new(Frame {
            timestamp,
            ssrc,
            list: Mutex::new(PacketList::new()),
            prev_frame: Mutex::new(Weak::new()),
            done_tx: Mutex::new(Some(tx)),
            done_rx: Mutex::new(Some(rx)),
        })
    }

    /// This frame's RTP timestamp.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// The SSRC this frame belongs to.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Set (or clear) the weak link to the preceding frame in timestamp
    /// order. Called by [`crate::frame_queue::FrameQueue`] on insertion.
    pub fn set_prev_frame(&self, prev: Weak<Frame>) {
        *self.prev_frame.lock().unwrap() = prev;
    }

    /// Whether this frame currently has a live predecessor link.
    pub fn has_prev_frame(&self) -> bool {
        self.prev_frame.lock().unwrap().upgrade().is_some()
    }

    /// Whether this frame's `prev_frame` link points at `other`. Exposed
    /// for tests that need to assert on the chain `FrameQueue::push`
    /// wires up, without handing out the underlying `Weak` itself.
    #[cfg(test)]
    pub(crate) fn prev_frame_ptr_eq(&self, other: &Arc<Frame>) -> bool {
        match self.prev_frame.lock().unwrap().upgrade() {
            Some(prev) => Arc::ptr_eq(&prev, other),
            None => false,
        }
    }

    /// Whether the tail packet's marker bit is set and the held packets
    /// densely cover the frame's sequence range.
    pub fn is_full(&self) -> bool {
        self.list.lock().unwrap().is_full()
    }

    /// A snapshot of this frame's packets, in sequence order. A `Mutex`
    /// backs the list, so unlike [`crate::packet_list::PacketList::cursor`]
    /// this can't hand back a borrowing iterator — callers get an owned
    /// copy instead.
    pub fn packets(&self) -> Vec<Packet> {
        self.list.lock().unwrap().cursor().cloned().collect()
    }

    /// Number of packets currently held.
    pub fn len(&self) -> usize {
        self.list.lock().unwrap().len()
    }

    /// Whether the frame holds no packets yet.
    pub fn is_empty(&self) -> bool {
        self.list.lock().unwrap().is_empty()
    }

    /// Take the receiver half of the completion signal. Returns `None`
    /// if already taken — only the `read_frame` call that owns this
    /// frame should call this, exactly once.
    pub fn take_done_receiver(&self) -> Option<oneshot::Receiver<()>> {
        self.done_rx.lock().unwrap().take()
    }

    /// Push one packet into the frame.
    ///
    /// Dispatches on the status of the previous frame (none / drain /
    /// ok, per spec §4.5) and fires the completion signal at most once,
    /// the first time content-fullness and sequence continuity across
    /// the frame boundary both hold.
    pub fn push(&self, packet: Packet) -> Result<(), PushError> {
        if self.is_full() {
            return Err(PushError::FrameFull);
        }

        let prev = self.prev_frame.lock().unwrap().upgrade();

        match &prev {
            None => {
                // No predecessor: nothing to check against but this
                // frame's own identity.
            }
            Some(prev) => {
                let cmp = compare_timestamp(packet.timestamp, prev.timestamp());
                let out_of_order = if prev.is_full() {
                    // "ok": predecessor is complete, reject strictly
                    // earlier timestamps.
                    cmp == Ordering::Less
                } else {
                    // "drain": predecessor still filling, reject
                    // same-or-earlier timestamps.
                    cmp != Ordering::Greater
                };
                if out_of_order {
                    return Err(PushError::TimestampInvalid);
                }
            }
        }

        if packet.timestamp != self.timestamp {
            return Err(PushError::TimestampInvalid);
        }

        let outcome = self.list.lock().unwrap().insert(packet);
        if outcome == InsertOutcome::DenyPacketDuplicated {
            return Err(PushError::PacketDuplicated);
        }

        self.maybe_complete(prev.as_deref());
        Ok(())
    }

    /// Fire the completion signal when content-fullness and sequence
    /// continuity across the frame boundary both hold.
    ///
    /// A frame with no predecessor never fires: there is no boundary to
    /// check continuity against, and only the `drain`/`ok` push paths
    /// (i.e. a predecessor is attached) signal completion. Such a root
    /// frame surfaces to its reader only through `read_frame`'s timeout.
    fn maybe_complete(&self, prev: Option<&Frame>) {
        if !self.is_full() {
            return;
        }

        let prev = match prev {
            None => return,
            Some(prev) => prev,
        };

        let continuity_ok = match (prev.list.lock().unwrap().tail(), self.list.lock().unwrap().head())
        {
            (Some(prev_tail), Some(my_head)) => {
                prev_tail.sequence.wrapping_add(1) == my_head.sequence
            }
            _ => false,
        };

        if continuity_ok {
            if let Some(tx) = self.done_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    }
}
