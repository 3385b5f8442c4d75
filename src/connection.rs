//! Multiplexes streams over one transport: a read pump, a dispatch
//! pump, and a write pump.
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
use crate::error::Result;
use crate::packet::Packet;
use crate::stream::Stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bidirectional byte transport consumed by [`Connection`].
///
/// One `read` is expected to yield exactly one datagram (typical for
/// UDP sockets); callers should pass buffers of at least 1500 bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read one datagram into `buf`, returning the number of bytes read.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;
    /// Write `buf` as one datagram.
    async fn write(&self, buf: &[u8]) -> Result<usize>;
    /// Close the transport. Idempotent.
    async fn close(&self) -> Result<()>;
}

struct ConnectionState {
    streams: HashMap<u32, Arc<Stream>>,
}

/// A multiplexer over one transport, keyed by SSRC on ingress. Owns
/// three long-running pumps: read (decode off the transport), dispatch
/// (route decoded packets to the right stream), and write (drain the
/// outbound queue back onto the transport).
pub struct Connection {
    transport: Arc<dyn Transport>,
    state: Mutex<ConnectionState>,
    config: Config,
    write_tx: mpsc::Sender<Packet>,
    cancel: CancellationToken,
    closed: AtomicBool,
    pumps: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Connection {
    /// Create a connection over `transport` and start its pumps.
    pub fn new(transport: Arc<dyn Transport>, config: Config) -> Arc<Connection> {
        let (write_tx, write_rx) = mpsc::channel(config.write_channel_capacity);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.write_channel_capacity);

        let conn = Arc::new(Connection {
            transport: Arc::clone(&transport),
            state: Mutex::new(ConnectionState {
                streams: HashMap::new(),
            }),
            config,
            write_tx,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            pumps: Mutex::new(Vec::new()),
        });

        let read_handle = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.read_pump(dispatch_tx).await })
        };
        let dispatch_handle = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.dispatch_pump(dispatch_rx).await })
        };
        let write_handle = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.write_pump(write_rx).await })
        };

        *conn.pumps.lock().unwrap() = vec![read_handle, dispatch_handle, write_handle];
        conn
    }

    /// Get (creating on demand) the stream for `ssrc`.
    pub fn stream(&self, ssrc: u32) -> Arc<Stream> {
        let mut state = self.state.lock().unwrap();
        state
            .streams
            .entry(ssrc)
            .or_insert_with(|| Stream::new(ssrc, self.write_tx.clone(), self.config.clone()))
            .clone()
    }

    /// Cancel all pumps and close the transport. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, AtomicOrdering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        self.transport.close().await
    }

    async fn read_pump(&self, dispatch_tx: mpsc::Sender<Packet>) {
        let mut buf = vec![0u8; 1500];
        loop {
            let n = tokio::select! {
                r = self.transport.read(&mut buf) => r,
                _ = self.cancel.cancelled() => {
                    tracing::debug!("read pump cancelled");
                    return;
                }
            };

            let n = match n {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("transport read failed, stopping read pump: {}", e);
                    self.cancel.cancel();
                    return;
                }
            };

            match Packet::decode(&buf[..n]) {
                Ok((packet, _used)) => {
                    if dispatch_tx.send(packet).await.is_err() {
                        tracing::debug!("dispatch channel closed, stopping read pump");
                        return;
                    }
                }
                Err(e) => {
                    // Recoverable: log and keep reading the next
                    // datagram rather than tearing down the pump.
                    tracing::warn!("dropping malformed datagram: {}", e);
                }
            }
        }
    }

    async fn dispatch_pump(&self, mut dispatch_rx: mpsc::Receiver<Packet>) {
        loop {
            let packet = tokio::select! {
                p = dispatch_rx.recv() => p,
                _ = self.cancel.cancelled() => {
                    tracing::debug!("dispatch pump cancelled");
                    return;
                }
            };

            let packet = match packet {
                Some(p) => p,
                None => return,
            };

            let ssrc = packet.ssrc;
            let stream = self.stream(ssrc);
            if let Err(e) = stream.dispatch(packet) {
                tracing::warn!(ssrc, "dispatch rejected packet: {}", e);
            }
        }
    }

    async fn write_pump(&self, mut write_rx: mpsc::Receiver<Packet>) {
        loop {
            let packet = tokio::select! {
                p = write_rx.recv() => p,
                _ = self.cancel.cancelled() => {
                    tracing::debug!("write pump cancelled");
                    return;
                }
            };

            let packet = match packet {
                Some(p) => p,
                None => return,
            };

            let encoded = packet.encode();
            if let Err(e) = self.transport.write(&encoded).await {
                tracing::error!("transport write failed, stopping write pump: {}", e);
                self.cancel.cancel();
                return;
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
