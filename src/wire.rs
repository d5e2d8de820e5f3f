// MIT License
//
// Copyright (c) 2022 Ankur Srivastava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The Confluent wire format: a 5-byte prefix (magic byte + big-endian
//! schema ID) in front of an Avro-encoded payload.
//!
//! ```text
//! [0u8][schema_id: u32 BE][payload ...]
//! ```

use crate::errors::RegistryError;
use crate::SchemaId;

/// Magic byte written in front of every message.
pub const MAGIC_BYTE: u8 = 0;

/// Length of the magic byte plus the schema ID.
pub const PREFIX_LEN: usize = 5;

/// Create the wire-format prefix for a schema ID.
pub fn pack_prefix(schema_id: SchemaId) -> [u8; PREFIX_LEN] {
    let mut prefix = [MAGIC_BYTE; PREFIX_LEN];
    prefix[1..].copy_from_slice(&schema_id.to_be_bytes());
    prefix
}

/// Split a wire-format message into its schema ID and payload.
///
/// The magic byte is not checked, any leading byte is accepted.
pub fn unpack_prefix(message: &[u8]) -> Result<(SchemaId, &[u8]), RegistryError> {
    if message.len() < PREFIX_LEN {
        return Err(RegistryError::MalformedMessage { len: message.len() });
    }
    let (prefix, payload) = message.split_at(PREFIX_LEN);
    let id = SchemaId::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]);
    Ok((id, payload))
}

/// Prefix `payload` with the wire-format header for `schema_id`.
pub fn frame(schema_id: SchemaId, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(PREFIX_LEN + payload.len());
    message.extend_from_slice(&pack_prefix(schema_id));
    message.extend_from_slice(payload);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_pack_prefix_layout() {
        assert_eq!(pack_prefix(0), [0, 0, 0, 0, 0]);
        assert_eq!(pack_prefix(7), [0, 0, 0, 0, 7]);
        assert_eq!(pack_prefix(0x0102_0304), [0, 1, 2, 3, 4]);
        assert_eq!(pack_prefix(u32::MAX), [0, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_roundtrip_random_ids_and_payloads() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let id: u32 = rng.random();
            let len = rng.random_range(0..64);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();

            let message = frame(id, &payload);
            let (unpacked_id, body) = unpack_prefix(&message).unwrap();
            assert_eq!(unpacked_id, id);
            assert_eq!(body, &payload[..]);
        }
    }

    #[test]
    fn test_roundtrip_boundary_ids() {
        for id in [0, 1, u32::MAX] {
            let message = frame(id, b"abc");
            let (unpacked, body) = unpack_prefix(&message).unwrap();
            assert_eq!(unpacked, id);
            assert_eq!(body, b"abc");
        }
    }

    #[test]
    fn test_prefix_only_has_empty_payload() {
        let message = pack_prefix(42);
        let (id, body) = unpack_prefix(&message).unwrap();
        assert_eq!(id, 42);
        assert!(body.is_empty());
    }

    #[test]
    fn test_short_messages_are_malformed() {
        for len in 0..PREFIX_LEN {
            let data = vec![0u8; len];
            match unpack_prefix(&data) {
                Err(RegistryError::MalformedMessage { len: reported }) => assert_eq!(reported, len),
                other => panic!("expected MalformedMessage, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_nonzero_magic_byte_is_accepted() {
        let data = [0xff, 0, 0, 0, 9, 1, 2];
        let (id, body) = unpack_prefix(&data).unwrap();
        assert_eq!(id, 9);
        assert_eq!(body, &[1, 2]);
    }
}
