//! Ordered, sequence-number-aware packet list for one frame
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
use crate::sequence::{compare_sequence, inclusive_distance};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Outcome of [`PacketList::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Packet was accepted and placed in sequence order.
    AcceptOk,
    /// A packet with this sequence number is already present.
    DenyPacketDuplicated,
}

/// Ordered collection of packets belonging to a single frame (same
/// timestamp, same SSRC). Backed by a `VecDeque` rather than a hand-rolled
/// doubly linked list: the documented invariants (O(1) head/tail access,
/// ordered walk, mid-list splice on reorder) hold for this safe container
/// just as well as for pointer-linked nodes, without unsafe code.
#[derive(Debug, Default)]
pub struct PacketList {
    packets: VecDeque<Packet>,
}

impl PacketList {
    /// Create an empty packet list.
    pub fn new() -> Self {
        PacketList {
            packets: VecDeque::new(),
        }
    }

    /// Number of packets currently held.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the list holds no packets.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// The packet with the smallest (wrap-aware) sequence number.
    pub fn head(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// The packet with the largest (wrap-aware) sequence number.
    pub fn tail(&self) -> Option<&Packet> {
        self.packets.back()
    }

    /// Insert a packet in sequence order.
    ///
    /// Cases are evaluated in the order the contract requires: append at
    /// tail, prepend at head, reject exact head/tail duplicates, reject
    /// when the range is already dense (no slot could exist), otherwise
    /// binary-search the ordered run for the insertion point.
    pub fn insert(&mut self, packet: Packet) -> InsertOutcome {
        let (head_seq, tail_seq) = match (self.head(), self.tail()) {
            (Some(h), Some(t)) => (h.sequence, t.sequence),
            _ => {
                self.packets.push_back(packet);
                return InsertOutcome::AcceptOk;
            }
        };

        if compare_sequence(packet.sequence, tail_seq) == Ordering::Greater {
            self.packets.push_back(packet);
            return InsertOutcome::AcceptOk;
        }

        if compare_sequence(packet.sequence, head_seq) == Ordering::Less {
            self.packets.push_front(packet);
            return InsertOutcome::AcceptOk;
        }

        if packet.sequence == head_seq || packet.sequence == tail_seq {
            return InsertOutcome::DenyPacketDuplicated;
        }

        if self.packets.len() as u32 == inclusive_distance(head_seq, tail_seq) {
            // Range is dense: every slot between head and tail is
            // occupied, so there is no room for another sequence number
            // strictly between them.
            return InsertOutcome::DenyPacketDuplicated;
        }

        let slice = self.packets.make_contiguous();
        match slice.binary_search_by(|existing| compare_sequence(existing.sequence, packet.sequence))
        {
            Ok(_) => InsertOutcome::DenyPacketDuplicated,
            Err(idx) => {
                self.packets.insert(idx, packet);
                InsertOutcome::AcceptOk
            }
        }
    }

    /// Whether the tail packet's marker bit is set and the held packets
    /// densely cover `[head.sequence, tail.sequence]` with no gaps.
    pub fn is_full(&self) -> bool {
        match (self.head(), self.tail()) {
            (Some(h), Some(t)) => {
                t.marker && self.packets.len() as u32 == inclusive_distance(h.sequence, t.sequence)
            }
            _ => false,
        }
    }

    /// A restartable, forward-only view over the packets in list order.
    /// Calling `cursor()` again starts a fresh walk from the head.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            iter: self.packets.iter(),
        }
    }
}

/// Forward-only iterator over a [`PacketList`]'s packets in sequence
/// order. Obtained fresh from [`PacketList::cursor`] each time a walk is
/// needed.
pub struct Cursor<'a> {
    iter: std::collections::vec_deque::Iter<'a, Packet>,
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a Packet;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
