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

use crate::bloom::BloomFilter;
use crate::bloom::sketch::MAX_NUM_BITS;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_preamble_longs_in;
use crate::codec::assert::ensure_serial_version_in;
use crate::codec::family::Family;
use crate::common::bitarray;
use crate::error::Error;

const PREAMBLE_LONGS_EMPTY: u8 = 3;
const PREAMBLE_LONGS_STANDARD: u8 = 4;
const SERIAL_VERSION: u8 = 1;
const EMPTY_FLAG_MASK: u8 = 1 << 2;

/// Stored bit count meaning "dirty, recount from the bit array".
const DIRTY_BITS_SENTINEL: u64 = u64::MAX;

impl BloomFilter {
    /// Serializes the filter to a byte vector.
    ///
    /// An empty filter is exactly 24 bytes; a non-empty filter is 32 bytes
    /// of preamble plus the bit array. The format is compatible with the
    /// DataSketches Java and C++ Bloom filters.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        let preamble_longs = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_STANDARD
        };

        let capacity = 8 * preamble_longs as usize
            + if is_empty { 0 } else { self.bit_array.len() * 8 };
        let mut bytes = SketchBytes::with_capacity(capacity);

        bytes.write_u8(preamble_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::BLOOMFILTER.id);
        bytes.write_u8(if is_empty { EMPTY_FLAG_MASK } else { 0 });
        bytes.write_u16_le(self.num_hashes);
        bytes.write_u16_le(0); // reserved

        bytes.write_u64_le(self.seed);
        bytes.write_u32_le(self.bit_array.len() as u32);
        bytes.write_u32_le(0); // reserved

        if !is_empty {
            bytes.write_u64_le(self.num_bits_set);
            for &word in &self.bit_array {
                bytes.write_u64_le(word);
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a filter from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`] when the family id,
    /// serial version, or preamble length is wrong, when the hash count is
    /// zero, when the declared bit-array length exceeds the envelope
    /// maximum, or when the buffer is shorter than declared.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
            move |_| Error::insufficient_data(tag)
        }

        let mut cursor = SketchSlice::new(bytes);
        let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let num_hashes = cursor.read_u16_le().map_err(make_error("num_hashes"))?;
        cursor.read_u16_le().map_err(make_error("reserved"))?;

        Family::BLOOMFILTER.validate_id(family_id)?;
        ensure_serial_version_in(&[SERIAL_VERSION], serial_version)?;
        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        let expected_preamble = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_STANDARD
        };
        ensure_preamble_longs_in(&[expected_preamble], preamble_longs)?;
        if num_hashes == 0 {
            return Err(Error::deserial("num_hashes must not be zero"));
        }

        let seed = cursor.read_u64_le().map_err(make_error("seed"))?;
        let num_words = cursor.read_u32_le().map_err(make_error("bit_array_length"))?;
        cursor.read_u32_le().map_err(make_error("reserved"))?;

        let capacity_bits = num_words as u64 * 64;
        if capacity_bits == 0 || capacity_bits > MAX_NUM_BITS {
            return Err(Error::deserial("bit array length out of range")
                .with_context("num_words", num_words));
        }

        if !is_empty {
            let declared = 8 + num_words as usize * 8;
            if bytes.len() < cursor.position() + declared {
                return Err(Error::insufficient_data("bit_array"));
            }
        }

        let mut bit_array = vec![0u64; num_words as usize];
        let num_bits_set = if is_empty {
            0
        } else {
            let stored = cursor.read_u64_le().map_err(make_error("num_bits_set"))?;
            for word in &mut bit_array {
                *word = cursor.read_u64_le().map_err(make_error("bit_array"))?;
            }
            if stored == DIRTY_BITS_SENTINEL {
                bitarray::popcount(&bit_array)
            } else {
                stored
            }
        };

        Ok(BloomFilter {
            seed,
            num_hashes,
            capacity_bits,
            num_bits_set,
            bit_array,
        })
    }
}
