//! Per-SSRC dispatcher: routes incoming packets to frames and exposes
//! `read_frame` / `write_frame` / `skip_samples` to consumers.
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

use crate::config::Config;
use crate::error::{Result, RtpError};
use crate::frame::Frame;
use crate::frame_queue::FrameQueue;
use crate::packet::Packet;
use crate::sequence::{compare_timestamp, Sequencer};
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything `dispatch` and `read_frame` must touch under one lock, per
/// the "one mutex protecting `{frameMap, frameQueue, currentReadingFrame}`"
/// requirement.
struct StreamState {
    frames: HashMap<u32, Arc<Frame>>,
    queue: FrameQueue,
    current_reading_frame: Option<Arc<Frame>>,
}

/// Per-SSRC state: in-flight frames keyed by timestamp, the ordered
/// frame queue, the currently-reading frame, an outbound sequencer, and
/// a running outbound timestamp.
pub struct Stream {
    ssrc: u32,
    state: Mutex<StreamState>,
    sequencer: Sequencer,
    outbound_timestamp: AtomicU32,
    send: mpsc::Sender<Packet>,
    config: Config,
}

impl Stream {
    pub(crate) fn new(ssrc: u32, send: mpsc::Sender<Packet>, config: Config) -> Arc<Stream> {
        Arc::new(Stream {
            ssrc,
            state: Mutex::new(StreamState {
                frames: HashMap::new(),
                queue: FrameQueue::new(),
                current_reading_frame: None,
            }),
            sequencer: Sequencer::new(),
            outbound_timestamp: AtomicU32::new(0),
            send,
            config,
        })
    }

    /// This stream's SSRC.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Route an incoming packet to the frame it belongs to.
    pub fn dispatch(&self, packet: Packet) -> Result<()> {
        if packet.ssrc != self.ssrc {
            return Err(RtpError::Dispatch(format!(
                "wrong ssrc: expected {}, got {}",
                self.ssrc, packet.ssrc
            )));
        }

        let ts = packet.timestamp;

        let curr = self.state.lock().unwrap().current_reading_frame.clone();
        if let Some(curr) = &curr {
            match compare_timestamp(ts, curr.timestamp()) {
                Ordering::Less => {
                    tracing::warn!(
                        ssrc = self.ssrc,
                        ts,
                        reading_ts = curr.timestamp(),
                        "dropping packet older than the current reading frame"
                    );
                    return Err(RtpError::Dispatch("packet too old".to_string()));
                }
                Ordering::Equal => {
                    curr.push(packet)?;
                    return Ok(());
                }
                Ordering::Greater => {}
            }
        }

        let frame = {
            let mut state = self.state.lock().unwrap();
            let frame = state
                .frames
                .entry(ts)
                .or_insert_with(|| Frame::new(ts, self.ssrc))
                .clone();
            let newly_queued = state.queue.push(frame.clone());
            if newly_queued && !frame.has_prev_frame() {
                if let Some(curr) = &curr {
                    frame.set_prev_frame(Arc::downgrade(curr));
                }
            }
            frame
        };

        frame.push(packet)?;
        tracing::debug!(ssrc = self.ssrc, ts, "dispatched packet");
        Ok(())
    }

    /// Pop the head frame and wait for it to complete, time out, or have
    /// its read cancelled.
    ///
    /// Fails immediately with [`RtpError::NoPackets`] if the queue is
    /// empty at call time — `read_frame` never blocks waiting for a
    /// frame to arrive. Once a frame has been popped it is always
    /// returned on timeout or successful completion so the caller can
    /// use partial content; only cancellation returns an error with no
    /// frame.
    pub async fn read_frame(&self, cancel: &CancellationToken) -> Result<Arc<Frame>> {
        let frame = match self.state.lock().unwrap().queue.pop() {
            Some(f) => f,
            None => return Err(RtpError::NoPackets),
        };

        {
            let mut state = self.state.lock().unwrap();
            state.current_reading_frame = Some(frame.clone());
        }

        let outcome = match frame.take_done_receiver() {
            Some(rx) => {
                tokio::select! {
                    r = rx => r.map_err(|_| RtpError::Read("completion signal dropped".to_string())),
                    _ = cancel.cancelled() => Err(RtpError::Cancelled),
                    _ = tokio::time::sleep(self.config.read_timeout) => Err(RtpError::Timeout),
                }
            }
            // Someone already consumed the receiver; nothing to wait on.
            None => Ok(()),
        };

        {
            let mut state = self.state.lock().unwrap();
            state.frames.remove(&frame.timestamp());
        }

        match outcome {
            Ok(()) => Ok(frame),
            Err(RtpError::Timeout) => {
                tracing::warn!(
                    ssrc = self.ssrc,
                    ts = frame.timestamp(),
                    "read_frame timed out, returning partial frame"
                );
                Ok(frame)
            }
            Err(e) => Err(e),
        }
    }

    /// Split `payload` into MTU-sized chunks, assign outgoing sequence
    /// numbers, and hand them to the connection's write pump.
    ///
    /// Returns the number of payload bytes successfully enqueued. Stops
    /// at the first send failure; the outbound timestamp still advances
    /// by `samples` regardless of outcome.
    pub async fn write_frame(
        &self,
        payload: Bytes,
        payload_type: u8,
        samples: u32,
        csrc: Vec<u32>,
    ) -> Result<usize> {
        let ts = self.outbound_timestamp.load(AtomicOrdering::SeqCst);

        let chunks: Vec<Bytes> = if payload.is_empty() {
            vec![Bytes::new()]
        } else {
            payload
                .chunks(self.config.mtu)
                .map(Bytes::copy_from_slice)
                .collect()
        };
        let last = chunks.len() - 1;

        let mut bytes_sent = 0usize;
        let mut send_err = None;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let packet = Packet {
                version: 2,
                padding: false,
                marker: i == last,
                payload_type,
                sequence: self.sequencer.next(),
                timestamp: ts,
                ssrc: self.ssrc,
                csrc: csrc.clone(),
                extension: None,
                payload: chunk.clone(),
            };
            if self.send.send(packet).await.is_err() {
                tracing::error!(ssrc = self.ssrc, "write pump channel closed");
                send_err = Some(RtpError::Closed);
                break;
            }
            bytes_sent += chunk.len();
        }

        self.outbound_timestamp
            .fetch_add(samples, AtomicOrdering::SeqCst);

        match send_err {
            Some(e) => Err(e),
            None => Ok(bytes_sent),
        }
    }

    /// Advance the outbound timestamp without emitting any packets,
    /// representing a gap in the media (e.g. silence suppression).
    pub fn skip_samples(&self, samples: u32) {
        self.outbound_timestamp
            .fetch_add(samples, AtomicOrdering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn packet(seq: u16, ts: u32, ssrc: u32, marker: bool, payload: &[u8]) -> Packet {
        Packet {
            version: 2,
            padding: false,
            marker,
            payload_type: 96,
            sequence: seq,
            timestamp: ts,
            ssrc,
            csrc: vec![],
            extension: None,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    fn test_stream() -> (Arc<Stream>, mpsc::Receiver<Packet>) {
        test_stream_with_config(Config::default())
    }

    fn test_stream_with_config(config: Config) -> (Arc<Stream>, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(100);
        (Stream::new(1, tx, config), rx)
    }

    #[test]
    fn dispatch_rejects_wrong_ssrc() {
        let (stream, _rx) = test_stream();
        let err = stream.dispatch(packet(1, 1000, 2, false, b"x")).unwrap_err();
        assert!(matches!(err, RtpError::Dispatch(_)));
    }

    #[tokio::test]
    async fn first_frame_has_no_predecessor_and_surfaces_via_timeout() {
        // A stream's very first frame has nothing to chain a prev_frame
        // link against, so per spec.md §4.5 it never fires the
        // completion signal even once full; read_frame only returns it
        // once its timeout elapses.
        let (stream, _rx) = test_stream_with_config(Config {
            read_timeout: std::time::Duration::from_millis(20),
            ..Config::default()
        });
        stream.dispatch(packet(1, 1000, 1, false, b"a")).unwrap();
        stream.dispatch(packet(2, 1000, 1, true, b"b")).unwrap();

        let cancel = CancellationToken::new();
        let frame = stream.read_frame(&cancel).await.unwrap();
        assert_eq!(frame.timestamp(), 1000);
        assert!(frame.is_full());
    }

    #[tokio::test]
    async fn second_frame_completes_via_signal_once_chained_to_predecessor() {
        let (stream, _rx) = test_stream();
        stream.dispatch(packet(1, 1000, 1, true, b"a")).unwrap();
        let cancel = CancellationToken::new();
        let first = stream.read_frame(&cancel).await.unwrap();
        assert_eq!(first.timestamp(), 1000);

        // Now that `first` is the current reading frame, the next frame
        // dispatched gets it as `prev_frame`, so completion fires as
        // soon as fullness and continuity both hold rather than waiting
        // on read_frame's timeout.
        stream.dispatch(packet(2, 2000, 1, true, b"b")).unwrap();
        let frame = tokio::time::timeout(Duration::from_millis(200), stream.read_frame(&cancel))
            .await
            .expect("completion signal should fire promptly")
            .unwrap();
        assert_eq!(frame.timestamp(), 2000);
        assert!(frame.is_full());
    }

    #[tokio::test]
    async fn read_frame_fails_immediately_on_empty_queue() {
        let (stream, _rx) = test_stream();
        let cancel = CancellationToken::new();
        let err = stream.read_frame(&cancel).await.unwrap_err();
        assert!(matches!(err, RtpError::NoPackets));
    }

    #[tokio::test]
    async fn read_frame_cancels_promptly() {
        let (stream, _rx) = test_stream();
        // Queue a partial (not yet full) frame so the pop succeeds and
        // read_frame has something to wait on for completion.
        stream.dispatch(packet(1, 1000, 1, false, b"a")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = stream.read_frame(&cancel).await.unwrap_err();
        assert!(matches!(err, RtpError::Cancelled));
    }

    /// Scenario S6 from the spec: write then read a single-chunk frame.
    #[tokio::test]
    async fn scenario_s6_write_then_read() {
        let (write_stream, mut rx) = test_stream();
        let read_stream = Stream::new(1, mpsc::channel(100).0, Config::default());

        let payload = Bytes::from_static(b"hello world");
        let sent = write_stream
            .write_frame(payload.clone(), 96, 3000, vec![])
            .await
            .unwrap();
        assert_eq!(sent, payload.len());

        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.timestamp, 0);
        assert!(packet.marker);
        assert_eq!(&packet.payload[..], &payload[..]);

        read_stream.dispatch(packet).unwrap();
        let cancel = CancellationToken::new();
        let frame = read_stream.read_frame(&cancel).await.unwrap();
        assert_eq!(frame.timestamp(), 0);
        assert!(frame.is_full());
        let packets = frame.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(&packets[0].payload[..], &payload[..]);
    }

    #[tokio::test]
    async fn write_frame_chunks_at_mtu_and_advances_timestamp() {
        let (stream, mut rx) = test_stream();
        let payload = Bytes::from(vec![7u8; 3000]);
        let sent = stream
            .write_frame(payload.clone(), 96, 3000, vec![])
            .await
            .unwrap();
        assert_eq!(sent, payload.len());

        let mut reassembled = Vec::new();
        let mut count = 0;
        while let Ok(p) = rx.try_recv() {
            count += 1;
            reassembled.extend_from_slice(&p.payload);
            if count == 3 {
                assert!(p.marker);
            } else {
                assert!(!p.marker);
            }
        }
        assert_eq!(count, 3); // ceil(3000 / 1300) == 3
        assert_eq!(reassembled, payload.to_vec());
    }

    #[tokio::test]
    async fn skip_samples_advances_outbound_timestamp_without_packets() {
        let (stream, mut rx) = test_stream();
        stream.skip_samples(1000);
        stream
            .write_frame(Bytes::from_static(b"x"), 96, 100, vec![])
            .await
            .unwrap();
        let packet = rx.recv().await.unwrap();
        assert_eq!(packet.timestamp, 1000);
    }
}
