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

use byteorder::{BE, LE, ReadBytesExt};
use std::io::Cursor;
use std::io::Seek;
use std::io::SeekFrom;

use crate::codec::SketchBytes;
use crate::codec::assert::ensure_preamble_longs_in;
use crate::codec::assert::ensure_serial_version_in;
use crate::codec::family::Family;
use crate::error::Error;
use crate::tdigest::sketch::Centroid;
use crate::tdigest::TDigest;

const PREAMBLE_LONGS_EMPTY_OR_SINGLE: u8 = 1;
const PREAMBLE_LONGS_MULTIPLE: u8 = 2;
const SERIAL_VERSION: u8 = 1;
const FLAGS_IS_EMPTY: u8 = 1 << 0;
const FLAGS_IS_SINGLE_VALUE: u8 = 1 << 1;
const FLAGS_REVERSE_MERGE: u8 = 1 << 2;

/// Encodings of the pre-1.0 big-endian reference format.
const COMPAT_DOUBLE: u32 = 1;
const COMPAT_FLOAT: u32 = 2;

impl TDigest {
    /// Serializes this t-Digest to bytes, compressing buffered values first.
    pub fn serialize(&mut self) -> Vec<u8> {
        self.compress();

        let total_weight = self.total_weight();
        let is_empty = total_weight == 0;
        let is_single = total_weight == 1;
        let preamble_longs = if is_empty || is_single {
            PREAMBLE_LONGS_EMPTY_OR_SINGLE
        } else {
            PREAMBLE_LONGS_MULTIPLE
        };

        let mut bytes = SketchBytes::with_capacity(
            8 * preamble_longs as usize + 16 + self.centroids.len() * 16,
        );
        bytes.write_u8(preamble_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::TDIGEST.id);
        bytes.write_u16_le(self.k);
        bytes.write_u8({
            let mut flags = 0;
            if is_empty {
                flags |= FLAGS_IS_EMPTY;
            }
            if is_single {
                flags |= FLAGS_IS_SINGLE_VALUE;
            }
            if self.reverse_merge {
                flags |= FLAGS_REVERSE_MERGE;
            }
            flags
        });
        bytes.write_u16_le(0); // reserved

        if is_empty {
            return bytes.into_bytes();
        }
        if is_single {
            bytes.write_f64_le(self.min);
            return bytes.into_bytes();
        }

        bytes.write_u32_le(self.centroids.len() as u32);
        bytes.write_u32_le(self.buffer.len() as u32);
        bytes.write_f64_le(self.min);
        bytes.write_f64_le(self.max);
        for centroid in &self.centroids {
            bytes.write_f64_le(centroid.mean);
            bytes.write_u64_le(centroid.weight);
        }
        for &value in &self.buffer {
            bytes.write_f64_le(value);
        }
        bytes.into_bytes()
    }

    /// Deserializes a t-Digest from bytes.
    ///
    /// When the first three bytes are all zero the input is taken to be the
    /// big-endian format of the original t-Digest reference implementation
    /// and routed through the read-only compatibility decoder.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() >= 3 && bytes[0] == 0 && bytes[1] == 0 && bytes[2] == 0 {
            return Self::deserialize_compat(bytes);
        }

        let make_error = |tag: &'static str| move |_| Error::insufficient_data(tag);
        let mut cursor = Cursor::new(bytes);

        let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        Family::TDIGEST.validate_id(family_id)?;
        ensure_serial_version_in(&[SERIAL_VERSION], serial_version)?;

        let k = cursor.read_u16::<LE>().map_err(make_error("k"))?;
        if k < 10 {
            return Err(Error::deserial("k must be at least 10").with_context("k", k));
        }
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let is_empty = (flags & FLAGS_IS_EMPTY) != 0;
        let is_single = (flags & FLAGS_IS_SINGLE_VALUE) != 0;
        let reverse_merge = (flags & FLAGS_REVERSE_MERGE) != 0;
        let expected_preamble = if is_empty || is_single {
            PREAMBLE_LONGS_EMPTY_OR_SINGLE
        } else {
            PREAMBLE_LONGS_MULTIPLE
        };
        ensure_preamble_longs_in(&[expected_preamble], preamble_longs)?;
        cursor.read_u16::<LE>().map_err(make_error("reserved"))?;

        if is_empty {
            return Ok(TDigest::make(
                k,
                reverse_merge,
                f64::INFINITY,
                f64::NEG_INFINITY,
                Vec::new(),
                0,
                Vec::new(),
            ));
        }

        if is_single {
            let value = cursor.read_f64::<LE>().map_err(make_error("single_value"))?;
            if value.is_nan() {
                return Err(Error::deserial("single value must not be NaN"));
            }
            return Ok(TDigest::make(
                k,
                reverse_merge,
                value,
                value,
                vec![Centroid {
                    mean: value,
                    weight: 1,
                }],
                1,
                Vec::new(),
            ));
        }

        let num_centroids = cursor.read_u32::<LE>().map_err(make_error("num_centroids"))?;
        let num_buffered = cursor.read_u32::<LE>().map_err(make_error("num_buffered"))?;
        let declared = 16 + num_centroids as u64 * 16 + num_buffered as u64 * 8;
        if (bytes.len() as u64) < cursor.position() + declared {
            return Err(Error::insufficient_data("centroids"));
        }
        let min = cursor.read_f64::<LE>().map_err(make_error("min"))?;
        let max = cursor.read_f64::<LE>().map_err(make_error("max"))?;
        if min.is_nan() || max.is_nan() || min > max {
            return Err(Error::deserial("invalid min/max pair")
                .with_context("min", min)
                .with_context("max", max));
        }

        let mut centroids = Vec::with_capacity(num_centroids as usize);
        let mut centroids_weight = 0u64;
        let mut previous_mean = f64::NEG_INFINITY;
        for _ in 0..num_centroids {
            let mean = cursor.read_f64::<LE>().map_err(make_error("mean"))?;
            let weight = cursor.read_u64::<LE>().map_err(make_error("weight"))?;
            if !mean.is_finite() {
                return Err(Error::deserial("centroid mean must be finite"));
            }
            if weight == 0 {
                return Err(Error::deserial("centroid weight must not be zero"));
            }
            if mean < previous_mean {
                return Err(Error::deserial("centroids must be sorted by mean"));
            }
            previous_mean = mean;
            centroids_weight += weight;
            centroids.push(Centroid { mean, weight });
        }

        let mut buffer = Vec::with_capacity(num_buffered as usize);
        for _ in 0..num_buffered {
            let value = cursor.read_f64::<LE>().map_err(make_error("buffered_value"))?;
            if value.is_nan() {
                return Err(Error::deserial("buffered value must not be NaN"));
            }
            buffer.push(value);
        }

        Ok(TDigest::make(
            k,
            reverse_merge,
            min,
            max,
            centroids,
            centroids_weight,
            buffer,
        ))
    }

    /// Decodes the big-endian layout of the t-Digest reference
    /// implementation, with either all-double or float32 centroids.
    ///
    /// This path is read-only and always clears the merge direction flag.
    fn deserialize_compat(bytes: &[u8]) -> Result<Self, Error> {
        let make_error = |tag: &'static str| move |_| Error::insufficient_data(tag);
        let mut cursor = Cursor::new(bytes);

        let encoding = cursor.read_u32::<BE>().map_err(make_error("encoding"))?;
        let (k, min, max, centroids) = match encoding {
            COMPAT_DOUBLE => {
                let min = cursor.read_f64::<BE>().map_err(make_error("min"))?;
                let max = cursor.read_f64::<BE>().map_err(make_error("max"))?;
                let k = cursor.read_f64::<BE>().map_err(make_error("k"))? as u16;
                let num_centroids =
                    cursor.read_u32::<BE>().map_err(make_error("num_centroids"))?;
                let mut centroids = Vec::with_capacity(num_centroids as usize);
                for _ in 0..num_centroids {
                    let weight = cursor.read_f64::<BE>().map_err(make_error("weight"))? as u64;
                    let mean = cursor.read_f64::<BE>().map_err(make_error("mean"))?;
                    centroids.push(Centroid { mean, weight });
                }
                (k, min, max, centroids)
            }
            COMPAT_FLOAT => {
                // the reference implementation uses doubles for min and max
                let min = cursor.read_f64::<BE>().map_err(make_error("min"))?;
                let max = cursor.read_f64::<BE>().map_err(make_error("max"))?;
                let k = cursor.read_f32::<BE>().map_err(make_error("k"))? as u16;
                // skip the stored centroid and buffer capacities
                cursor
                    .seek(SeekFrom::Current(8))
                    .map_err(make_error("capacities"))?;
                let num_centroids =
                    cursor.read_u16::<BE>().map_err(make_error("num_centroids"))?;
                let mut centroids = Vec::with_capacity(num_centroids as usize);
                for _ in 0..num_centroids {
                    let weight = cursor.read_f32::<BE>().map_err(make_error("weight"))? as u64;
                    let mean = cursor.read_f32::<BE>().map_err(make_error("mean"))? as f64;
                    centroids.push(Centroid { mean, weight });
                }
                (k, min, max, centroids)
            }
            _ => {
                return Err(Error::deserial("unrecognized compatibility encoding")
                    .with_context("encoding", encoding));
            }
        };

        if k < 10 {
            return Err(Error::deserial("k must be at least 10").with_context("k", k));
        }
        if min.is_nan() || max.is_nan() || min > max {
            return Err(Error::deserial("invalid min/max pair"));
        }
        let mut centroids_weight = 0u64;
        for centroid in &centroids {
            if !centroid.mean.is_finite() {
                return Err(Error::deserial("centroid mean must be finite"));
            }
            if centroid.weight == 0 {
                return Err(Error::deserial("centroid weight must not be zero"));
            }
            centroids_weight += centroid.weight;
        }

        Ok(TDigest::make(
            k,
            false,
            min,
            max,
            centroids,
            centroids_weight,
            Vec::new(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_round_trip() {
        let mut sketch = TDigest::new(100).unwrap();
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 8);
        let restored = TDigest::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
        assert_eq!(restored.k(), 100);
    }

    #[test]
    fn test_single_value_round_trip() {
        let mut sketch = TDigest::new(100).unwrap();
        sketch.update(42.5).unwrap();
        let bytes = sketch.serialize();
        assert_eq!(bytes.len(), 16);
        let mut restored = TDigest::deserialize(&bytes).unwrap();
        assert_eq!(restored.total_weight(), 1);
        assert_eq!(restored.quantile(0.5).unwrap(), 42.5);
    }

    #[test]
    fn test_compat_double_decoding() {
        // hand-built reference layout: type, min, max, k, count, centroids
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&COMPAT_DOUBLE.to_be_bytes());
        bytes.extend_from_slice(&1.0_f64.to_be_bytes());
        bytes.extend_from_slice(&3.0_f64.to_be_bytes());
        bytes.extend_from_slice(&100.0_f64.to_be_bytes());
        bytes.extend_from_slice(&2_u32.to_be_bytes());
        bytes.extend_from_slice(&1.0_f64.to_be_bytes()); // weight
        bytes.extend_from_slice(&1.0_f64.to_be_bytes()); // mean
        bytes.extend_from_slice(&1.0_f64.to_be_bytes());
        bytes.extend_from_slice(&3.0_f64.to_be_bytes());

        let restored = TDigest::deserialize(&bytes).unwrap();
        assert_eq!(restored.k(), 100);
        assert_eq!(restored.total_weight(), 2);
        assert_eq!(restored.min_value().unwrap(), 1.0);
        assert_eq!(restored.max_value().unwrap(), 3.0);
        assert!(!restored.reverse_merge);
    }

    #[test]
    fn test_compat_float_decoding() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&COMPAT_FLOAT.to_be_bytes());
        bytes.extend_from_slice(&1.0_f64.to_be_bytes());
        bytes.extend_from_slice(&2.0_f64.to_be_bytes());
        bytes.extend_from_slice(&100.0_f32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 8]); // stored capacities
        bytes.extend_from_slice(&1_u16.to_be_bytes());
        bytes.extend_from_slice(&2.0_f32.to_be_bytes()); // weight
        bytes.extend_from_slice(&1.5_f32.to_be_bytes()); // mean

        let restored = TDigest::deserialize(&bytes).unwrap();
        assert_eq!(restored.k(), 100);
        assert_eq!(restored.total_weight(), 2);
        assert!(!restored.reverse_merge);
    }

    #[test]
    fn test_rejects_zero_weight_centroid() {
        let mut sketch = TDigest::new(100).unwrap();
        for i in 0..1000 {
            sketch.update(i as f64).unwrap();
        }
        let mut bytes = sketch.serialize();
        // corrupt the first centroid weight (offset 32 mean + 8)
        bytes[40..48].copy_from_slice(&0_u64.to_le_bytes());
        assert!(TDigest::deserialize(&bytes).is_err());
    }

    #[test]
    fn test_rejects_wrong_family_and_version() {
        let mut sketch = TDigest::new(100).unwrap();
        sketch.update(1.0).unwrap();
        let bytes = sketch.serialize();

        let mut wrong_family = bytes.clone();
        wrong_family[2] = 21;
        assert!(TDigest::deserialize(&wrong_family).is_err());

        let mut wrong_version = bytes.clone();
        wrong_version[1] = 9;
        assert!(TDigest::deserialize(&wrong_version).is_err());
    }
}
