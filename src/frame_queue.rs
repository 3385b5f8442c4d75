//! Timestamp-ordered frame queue and its blocking-pop wrapper
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

use crate::frame::Frame;
use crate::sequence::compare_timestamp;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Frames ordered ascending by wrap-aware timestamp. Backed by a
/// `VecDeque<Arc<Frame>>` for the same reason [`crate::packet_list::PacketList`]
/// is: O(1) head access and an ordered walk are what the contract needs,
/// not pointer identity between nodes.
#[derive(Default)]
pub struct FrameQueue {
    frames: VecDeque<Arc<Frame>>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        FrameQueue {
            frames: VecDeque::new(),
        }
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Insert `frame` in timestamp order, patching `prev_frame` links so
    /// the chain Frame's completion logic relies on stays intact.
    ///
    /// Returns `true` if accepted, `false` if a frame with the same
    /// timestamp is already queued.
    pub fn push(&mut self, frame: Arc<Frame>) -> bool {
        if self.frames.is_empty() {
            self.frames.push_back(frame);
            return true;
        }

        let head = self.frames.front().unwrap();
        match compare_timestamp(frame.timestamp(), head.timestamp()) {
            Ordering::Equal => return false,
            Ordering::Less => {
                head.set_prev_frame(Arc::downgrade(&frame));
                self.frames.push_front(frame);
                return true;
            }
            Ordering::Greater => {}
        }

        let tail = self.frames.back().unwrap();
        match compare_timestamp(frame.timestamp(), tail.timestamp()) {
            Ordering::Equal => return false,
            Ordering::Greater => {
                frame.set_prev_frame(Arc::downgrade(tail));
                self.frames.push_back(frame);
                return true;
            }
            Ordering::Less => {}
        }

        for idx in 0..self.frames.len() - 1 {
            let curr = &self.frames[idx];
            let next = &self.frames[idx + 1];
            if compare_timestamp(frame.timestamp(), curr.timestamp()) == Ordering::Equal
                || compare_timestamp(frame.timestamp(), next.timestamp()) == Ordering::Equal
            {
                return false;
            }
            if compare_timestamp(next.timestamp(), frame.timestamp()) == Ordering::Greater {
                frame.set_prev_frame(Arc::downgrade(curr));
                next.set_prev_frame(Arc::downgrade(&frame));
                self.frames.insert(idx + 1, frame);
                return true;
            }
        }

        // Every comparison above is exhaustive for a list already sorted
        // by compare_timestamp, so this is unreachable in practice.
        false
    }

    /// Remove and return the earliest-timestamp frame.
    pub fn pop(&mut self) -> Option<Arc<Frame>> {
        self.frames.pop_front()
    }

    /// The earliest-timestamp frame without removing it.
    pub fn peek(&self) -> Option<&Arc<Frame>> {
        self.frames.front()
    }
}

/// `FrameQueue` guarded by a mutex with a single-pending-signal notify,
/// giving `pop` a cancellable blocking wait when the queue is empty.
pub struct FrameWaitQueue {
    queue: Mutex<FrameQueue>,
    notify: tokio::sync::Notify,
}

impl FrameWaitQueue {
    /// Create an empty wait queue.
    pub fn new() -> Self {
        FrameWaitQueue {
            queue: Mutex::new(FrameQueue::new()),
            notify: tokio::sync::Notify::new(),
        }
    }

    /// Push a frame, waking one waiting `pop` if the queue was empty
    /// before this insertion.
    pub fn push(&self, frame: Arc<Frame>) -> bool {
        let was_empty;
        let accepted;
        {
            let mut queue = self.queue.lock().unwrap();
            was_empty = queue.is_empty();
            accepted = queue.push(frame);
        }
        if accepted && was_empty {
            self.notify.notify_one();
        }
        accepted
    }

    /// Pop the earliest-timestamp frame, waiting for one to arrive if the
    /// queue is currently empty. Returns `None` if `cancel` fires first.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<Arc<Frame>> {
        loop {
            if let Some(frame) = self.queue.lock().unwrap().pop() {
                return Some(frame);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether the queue holds no frames.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

impl Default for FrameWaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts: u32) -> Arc<Frame> {
        Frame::new(ts, 1)
    }

    #[test]
    fn single_timestamp_queue_accepts_one() {
        let mut q = FrameQueue::new();
        assert!(q.push(frame(100)));
        assert!(!q.push(frame(100)));
        assert_eq!(q.len(), 1);
    }

    /// Scenario S5 from the spec.
    #[test]
    fn scenario_s5_frame_queue_ordering() {
        let timestamps = [5000u32, 9000, 4000, 7000, 10000, 3000, 2000, 6000, 4000];
        let mut q = FrameQueue::new();
        let mut accepted = vec![];
        for ts in timestamps {
            if q.push(frame(ts)) {
                accepted.push(ts);
            }
        }
        // the duplicate 4000 must have been rejected
        assert_eq!(accepted.len(), 8);

        let mut popped = vec![];
        let mut prev: Option<Arc<Frame>> = None;
        while let Some(f) = q.pop() {
            if let Some(prev) = &prev {
                // the frame we just popped should chain back to the one
                // popped immediately before it
                assert!(f.prev_frame_ptr_eq(prev));
            }
            popped.push(f.timestamp());
            prev = Some(f);
        }
        assert_eq!(
            popped,
            vec![2000, 3000, 4000, 5000, 6000, 7000, 9000, 10000]
        );
    }

    #[tokio::test]
    async fn wait_queue_pop_returns_immediately_when_nonempty() {
        let wq = FrameWaitQueue::new();
        wq.push(frame(1));
        let cancel = CancellationToken::new();
        let got = wq.pop(&cancel).await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn wait_queue_pop_cancels() {
        let wq = FrameWaitQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let got = wq.pop(&cancel).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn wait_queue_pop_wakes_on_push() {
        let wq = Arc::new(FrameWaitQueue::new());
        let cancel = CancellationToken::new();
        let wq2 = Arc::clone(&wq);
        let handle = tokio::spawn(async move { wq2.pop(&CancellationToken::new()).await });
        tokio::task::yield_now().await;
        wq.push(frame(42));
        let got = handle.await.unwrap();
        assert_eq!(got.unwrap().timestamp(), 42);
    }
}
