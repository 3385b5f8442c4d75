//! Error types for the RTP endpoint core
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


use thiserror::Error;

/// Result type for RTP core operations
pub type Result<T> = std::result::Result<T, RtpError>;

/// Errors that can occur while decoding one RTP datagram.
///
/// Kept separate from [`RtpError`] because the read pump must branch on
/// which of the two occurred: `Lack` means the buffer doesn't hold a full
/// datagram yet, `Illegal` means the datagram is structurally invalid.
/// Both are recoverable — the pump logs and continues with the next
/// datagram rather than tearing down the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the header or the lengths it declares
    /// (CSRC list, extension) require.
    #[error("not enough bytes to decode RTP packet: {0}")]
    Lack(String),

    /// Buffer is long enough but its contents are inconsistent, e.g. the
    /// declared padding length consumes more than the payload holds.
    #[error("malformed RTP packet: {0}")]
    Illegal(String),
}

/// Errors that can occur in the RTP endpoint core
#[derive(Error, Debug)]
pub enum RtpError {
    /// Wraps a packet decode failure.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A packet pushed into a frame was rejected.
    #[error("packet rejected: {0}")]
    Push(#[from] crate::frame::PushError),

    /// `Stream::dispatch` could not route the packet.
    #[error("dispatch rejected: {0}")]
    Dispatch(String),

    /// `Stream::read_frame` could not return a frame.
    #[error("read_frame failed: {0}")]
    Read(String),

    /// `Stream::read_frame` was called while the frame queue was empty.
    #[error("no packets")]
    NoPackets,

    /// `read_frame`'s context was cancelled.
    #[error("read_frame cancelled")]
    Cancelled,

    /// `read_frame` timed out waiting for frame completion.
    #[error("read_frame timed out")]
    Timeout,

    /// The connection (and its transport) is closed.
    #[error("connection closed")]
    Closed,

    /// Underlying transport I/O failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<std::io::Error> for RtpError {
    fn from(err: std::io::Error) -> Self {
        RtpError::Transport(err.to_string())
    }
}

