// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Serialization of the items stored in sampling sketches.
//!
//! The sketches are generic over their item type; a caller-supplied serde
//! maps items to and from the envelope body. Fixed-width types occupy 8
//! little-endian bytes each; strings carry a 4-byte little-endian length
//! prefix followed by UTF-8 bytes, matching the Java `ArrayOf*SerDe`
//! family.

use std::str;

use crate::error::Error;

/// Serializer/deserializer for items stored in a sampling sketch.
pub trait ItemsSerde<T> {
    /// Serializes a slice of items to a byte buffer.
    fn serialize_items(&self, items: &[T]) -> Vec<u8>;

    /// Deserializes `num_items` from bytes, returning items and bytes consumed.
    fn deserialize_items(&self, bytes: &[u8], num_items: usize)
    -> Result<(Vec<T>, usize), Error>;
}

/// Serializer for i64 items compatible with ArrayOfLongsSerDe in Java.
#[derive(Debug, Default, Clone, Copy)]
pub struct I64Serde;

impl ItemsSerde<i64> for I64Serde {
    fn serialize_items(&self, items: &[i64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(items.len() * 8);
        for item in items {
            out.extend_from_slice(&item.to_le_bytes());
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<i64>, usize), Error> {
        let needed = fixed_width_size(num_items)?;
        if bytes.len() < needed {
            return Err(Error::insufficient_data("not enough bytes for i64 items"));
        }
        let mut items = Vec::with_capacity(num_items);
        for chunk in bytes[..needed].chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            items.push(i64::from_le_bytes(buf));
        }
        Ok((items, needed))
    }
}

/// Serializer for u64 items using the same 8-byte layout as [`I64Serde`].
#[derive(Debug, Default, Clone, Copy)]
pub struct U64Serde;

impl ItemsSerde<u64> for U64Serde {
    fn serialize_items(&self, items: &[u64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(items.len() * 8);
        for item in items {
            out.extend_from_slice(&item.to_le_bytes());
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<u64>, usize), Error> {
        let needed = fixed_width_size(num_items)?;
        if bytes.len() < needed {
            return Err(Error::insufficient_data("not enough bytes for u64 items"));
        }
        let mut items = Vec::with_capacity(num_items);
        for chunk in bytes[..needed].chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            items.push(u64::from_le_bytes(buf));
        }
        Ok((items, needed))
    }
}

/// Serializer for f64 items compatible with ArrayOfDoublesSerDe in Java.
#[derive(Debug, Default, Clone, Copy)]
pub struct F64Serde;

impl ItemsSerde<f64> for F64Serde {
    fn serialize_items(&self, items: &[f64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(items.len() * 8);
        for item in items {
            out.extend_from_slice(&item.to_le_bytes());
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<f64>, usize), Error> {
        let needed = fixed_width_size(num_items)?;
        if bytes.len() < needed {
            return Err(Error::insufficient_data("not enough bytes for f64 items"));
        }
        let mut items = Vec::with_capacity(num_items);
        for chunk in bytes[..needed].chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            items.push(f64::from_le_bytes(buf));
        }
        Ok((items, needed))
    }
}

/// Serializer for UTF-8 strings compatible with ArrayOfStringsSerDe in Java.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerde;

impl ItemsSerde<String> for StringSerde {
    fn serialize_items(&self, items: &[String]) -> Vec<u8> {
        let mut out = Vec::new();
        for item in items {
            let bytes = item.as_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<String>, usize), Error> {
        let mut items = Vec::with_capacity(num_items);
        let mut offset = 0usize;
        for _ in 0..num_items {
            if offset + 4 > bytes.len() {
                return Err(Error::insufficient_data(
                    "not enough bytes for string length",
                ));
            }
            let len = u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]) as usize;
            offset += 4;
            if offset + len > bytes.len() {
                return Err(Error::insufficient_data(
                    "not enough bytes for string payload",
                ));
            }
            let value = str::from_utf8(&bytes[offset..offset + len])
                .map_err(|_| Error::deserial("invalid UTF-8 string payload"))?
                .to_string();
            items.push(value);
            offset += len;
        }
        Ok((items, offset))
    }
}

fn fixed_width_size(num_items: usize) -> Result<usize, Error> {
    num_items
        .checked_mul(8)
        .ok_or_else(|| Error::deserial("items size overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_round_trip() {
        let items = vec![-1i64, 0, 42, i64::MAX, i64::MIN];
        let bytes = I64Serde.serialize_items(&items);
        assert_eq!(bytes.len(), items.len() * 8);
        let (decoded, consumed) = I64Serde.deserialize_items(&bytes, items.len()).unwrap();
        assert_eq!(decoded, items);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_string_round_trip() {
        let items = vec!["".to_string(), "abc".to_string(), "héllo".to_string()];
        let bytes = StringSerde.serialize_items(&items);
        let (decoded, consumed) = StringSerde.deserialize_items(&bytes, items.len()).unwrap();
        assert_eq!(decoded, items);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_string_truncated_payload() {
        let items = vec!["abcdef".to_string()];
        let bytes = StringSerde.serialize_items(&items);
        assert!(StringSerde.deserialize_items(&bytes[..7], 1).is_err());
        assert!(StringSerde.deserialize_items(&bytes[..3], 1).is_err());
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        assert!(StringSerde.deserialize_items(&bytes, 1).is_err());
    }

    #[test]
    fn test_f64_round_trip_preserves_bits() {
        let items = vec![0.0, -0.0, 1.5, f64::MAX];
        let bytes = F64Serde.serialize_items(&items);
        let (decoded, _) = F64Serde.deserialize_items(&bytes, items.len()).unwrap();
        for (a, b) in items.iter().zip(&decoded) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
