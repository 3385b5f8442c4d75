//! RTP packet codec (RFC 3550)
//!
//! Bit-exact fixed header, CSRC list, optional extension header, payload
//! and padding, as specified by the wire format this core speaks. This
//! module owns the only place in the crate that reasons about raw bytes;
//! everything above it works with [`Packet`] values.
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

use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

/// Minimum RTP header size (12 bytes), before CSRC/extension.
pub const FIXED_HEADER_SIZE: usize = 12;

/// RTP header extension, present iff the header's extension bit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Profile-specific identifier.
    pub profile: u16,
    /// Length of `header_extensions` in 32-bit words.
    pub length: u16,
    /// Extension payload, always `4 * length` bytes.
    pub header_extensions: Bytes,
}

/// One RTP packet: fixed header fields, CSRC list, optional extension,
/// and payload (padding already stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension: Option<Extension>,
    pub payload: Bytes,
}

impl Packet {
    /// `csrc_count` as it would be encoded on the wire.
    pub fn csrc_count(&self) -> u8 {
        self.csrc.len() as u8
    }

    /// Encode this packet to its wire representation.
    ///
    /// Forces `version = 2` and derives the extension/CSRC-count flags
    /// from the packet's content rather than trusting stored flags.
    /// Padding is never emitted on egress — this core never produces it.
    pub fn encode(&self) -> BytesMut {
        let has_ext = self.extension.is_some();
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        let mut byte0 = (2u8) << 6;
        if has_ext {
            byte0 |= 0x10;
        }
        byte0 |= self.csrc_count() & 0x0F;
        buf.put_u8(byte0);

        let mut byte1 = self.payload_type & 0x7F;
        if self.marker {
            byte1 |= 0x80;
        }
        buf.put_u8(byte1);

        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);

        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if let Some(ext) = &self.extension {
            buf.put_u16(ext.profile);
            buf.put_u16(ext.length);
            buf.put_slice(&ext.header_extensions);
        }

        buf.put_slice(&self.payload);
        buf
    }

    fn encoded_len(&self) -> usize {
        let mut len = FIXED_HEADER_SIZE + self.csrc.len() * 4;
        if let Some(ext) = &self.extension {
            len += 4 + ext.header_extensions.len();
        }
        len + self.payload.len()
    }

    /// Decode one RTP datagram from the front of `buf`.
    ///
    /// Returns the number of bytes consumed, which is always `<=
    /// buf.len()`. Does not require `buf` to contain exactly one
    /// datagram and nothing more, but this core's transport contract
    /// (one `read` == one datagram) means the returned length normally
    /// equals `buf.len()`.
    pub fn decode(buf: &[u8]) -> Result<(Packet, usize), DecodeError> {
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(DecodeError::Lack(format!(
                "need at least {} bytes, have {}",
                FIXED_HEADER_SIZE,
                buf.len()
            )));
        }

        let byte0 = buf[0];
        let version = byte0 >> 6;
        let padding = (byte0 & 0x20) != 0;
        let has_ext = (byte0 & 0x10) != 0;
        let csrc_count = byte0 & 0x0F;

        let byte1 = buf[1];
        let marker = (byte1 & 0x80) != 0;
        let payload_type = byte1 & 0x7F;

        let sequence = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut offset = FIXED_HEADER_SIZE;
        let mut csrc = Vec::with_capacity(csrc_count as usize);
        for _ in 0..csrc_count {
            if buf.len() < offset + 4 {
                return Err(DecodeError::Lack("truncated CSRC list".to_string()));
            }
            csrc.push(u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]));
            offset += 4;
        }

        let extension = if has_ext {
            if buf.len() < offset + 4 {
                return Err(DecodeError::Lack("truncated extension header".to_string()));
            }
            let profile = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let length = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]);
            offset += 4;
            let ext_len = length as usize * 4;
            if buf.len() < offset + ext_len {
                return Err(DecodeError::Lack("truncated extension payload".to_string()));
            }
            let header_extensions = Bytes::copy_from_slice(&buf[offset..offset + ext_len]);
            offset += ext_len;
            Some(Extension {
                profile,
                length,
                header_extensions,
            })
        } else {
            None
        };

        let payload_start = offset;
        let payload_end = if padding {
            if buf.len() == payload_start {
                return Err(DecodeError::Illegal(
                    "padding flag set but no payload bytes".to_string(),
                ));
            }
            let pad_len = buf[buf.len() - 1] as usize;
            let end = buf.len() as isize - pad_len as isize;
            if (end as usize) < payload_start || end < payload_start as isize {
                return Err(DecodeError::Illegal(format!(
                    "padding length {} overruns payload",
                    pad_len
                )));
            }
            end as usize
        } else {
            buf.len()
        };

        let payload = Bytes::copy_from_slice(&buf[payload_start..payload_end]);

        let packet = Packet {
            version,
            padding,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload,
        };

        Ok((packet, buf.len()))
    }
}
