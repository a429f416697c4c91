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

//! Binary envelopes for the sampling sketches.
//!
//! All three families share preamble byte 0: the resize factor's lg in the
//! high two bits and the preamble length in longs in the low six. Items are
//! carried by a caller-supplied [`ItemsSerde`].

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_preamble_longs_in;
use crate::codec::assert::ensure_serial_version_in;
use crate::codec::family::Family;
use crate::common::resize::ResizeFactor;
use crate::error::Error;
use crate::sampling::MAX_ITEMS_SEEN;
use crate::sampling::ReservoirSketch;
use crate::sampling::ReservoirUnion;
use crate::sampling::VarOptSketch;
use crate::sampling::reservoir;
use crate::sampling::serde::ItemsSerde;
use crate::sampling::varopt;

const SERIAL_VERSION: u8 = 2;
const SERIAL_VERSION_LEGACY: u8 = 1;

const PREAMBLE_LONGS_EMPTY: u8 = 1;
const PREAMBLE_LONGS_NONEMPTY: u8 = 2;
const VAROPT_PREAMBLE_LONGS_WARMUP: u8 = 3;
const VAROPT_PREAMBLE_LONGS_FULL: u8 = 4;

const EMPTY_FLAG_MASK: u8 = 1 << 2;
const GADGET_FLAG_MASK: u8 = 1 << 7;

/// Largest legacy 16-bit encoded reservoir size.
const MAX_ENCODED_SIZE: u16 = 0xF7FF;

fn pack_preamble_byte(rf: ResizeFactor, preamble_longs: u8) -> u8 {
    ((rf.lg() as u8) << 6) | (preamble_longs & 0x3F)
}

fn unpack_preamble_byte(byte: u8) -> Result<(ResizeFactor, u8), Error> {
    let rf = ResizeFactor::from_lg(byte >> 6)?;
    Ok((rf, byte & 0x3F))
}

/// Decodes the legacy exponent/mantissa reservoir-size encoding:
/// the high 5 bits above bit 11 are a power of two and the low 11 bits an
/// 11-bit fraction of the next power.
fn decode_reservoir_size(encoded: u16) -> Result<u32, Error> {
    if encoded > MAX_ENCODED_SIZE {
        return Err(Error::deserial("legacy reservoir size out of range")
            .with_context("encoded", encoded));
    }
    let pre = (encoded >> 11) as u32;
    let index = (encoded & 0x7FF) as f64;
    Ok(((1u64 << pre) as f64 * (index / 2048.0 + 1.0)) as u32)
}

fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |_| Error::insufficient_data(tag)
}

// ============================================================================
// Reservoir sketch
// ============================================================================

impl<T> ReservoirSketch<T> {
    /// Serializes the sketch using `serde` for the retained items.
    pub fn serialize<S: ItemsSerde<T>>(&self, serde: &S) -> Vec<u8> {
        let is_empty = self.is_empty();
        let preamble_longs = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_NONEMPTY
        };

        let mut bytes = SketchBytes::with_capacity(8 * preamble_longs as usize);
        bytes.write_u8(pack_preamble_byte(self.rf, preamble_longs));
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::RESERVOIR.id);
        bytes.write_u8(if is_empty { EMPTY_FLAG_MASK } else { 0 });
        bytes.write_u32_le(self.k);

        if !is_empty {
            bytes.write_u64_le(self.n);
            bytes.write(&serde.serialize_items(&self.data));
        }
        bytes.into_bytes()
    }

    /// Deserializes a sketch, reading items with `serde`.
    ///
    /// Serial version 2 is the written format; the legacy version 1 with
    /// its 16-bit encoded `k` is also accepted.
    pub fn deserialize<S: ItemsSerde<T>>(bytes: &[u8], serde: &S) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble_byte = cursor.read_u8().map_err(make_error("preamble_byte"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;

        Family::RESERVOIR.validate_id(family_id)?;
        ensure_serial_version_in(&[SERIAL_VERSION, SERIAL_VERSION_LEGACY], serial_version)?;
        let (rf, preamble_longs) = unpack_preamble_byte(preamble_byte)?;
        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        let expected_preamble = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_NONEMPTY
        };
        ensure_preamble_longs_in(&[expected_preamble], preamble_longs)?;

        let k = if serial_version == SERIAL_VERSION_LEGACY {
            let encoded = cursor.read_u16_le().map_err(make_error("encoded_k"))?;
            cursor.read_u16_le().map_err(make_error("reserved"))?;
            decode_reservoir_size(encoded)?
        } else {
            cursor.read_u32_le().map_err(make_error("k"))?
        };
        if k < reservoir::MIN_K {
            return Err(Error::deserial("k must be at least 2").with_context("k", k));
        }

        if is_empty {
            return Ok(ReservoirSketch::from_parts(k, rf, 0, Vec::new()));
        }

        let n = cursor.read_u64_le().map_err(make_error("n"))?;
        if n == 0 || n > MAX_ITEMS_SEEN {
            return Err(Error::deserial("item count out of range").with_context("n", n));
        }

        let num_items = n.min(k as u64) as usize;
        let (data, _) = serde.deserialize_items(&bytes[cursor.position()..], num_items)?;
        Ok(ReservoirSketch::from_parts(k, rf, n, data))
    }
}

// ============================================================================
// Reservoir union
// ============================================================================

impl<T: Clone> ReservoirUnion<T> {
    /// Serializes the union: an 8-byte preamble carrying `max_k`, followed
    /// by the gadget sketch when one is present.
    pub fn serialize<S: ItemsSerde<T>>(&self, serde: &S) -> Vec<u8> {
        let is_empty = self.is_empty();

        let mut bytes = SketchBytes::with_capacity(8);
        bytes.write_u8(pack_preamble_byte(ResizeFactor::X1, PREAMBLE_LONGS_EMPTY));
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::RESERVOIR_UNION.id);
        bytes.write_u8(if is_empty { EMPTY_FLAG_MASK } else { 0 });
        bytes.write_u32_le(self.max_k);

        if !is_empty {
            if let Some(gadget) = &self.gadget {
                bytes.write(&gadget.serialize(serde));
            }
        }
        bytes.into_bytes()
    }

    /// Deserializes a union, reading the embedded gadget with `serde`.
    pub fn deserialize<S: ItemsSerde<T>>(bytes: &[u8], serde: &S) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble_byte = cursor.read_u8().map_err(make_error("preamble_byte"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let max_k = cursor.read_u32_le().map_err(make_error("max_k"))?;

        Family::RESERVOIR_UNION.validate_id(family_id)?;
        ensure_serial_version_in(&[SERIAL_VERSION, SERIAL_VERSION_LEGACY], serial_version)?;
        let (_, preamble_longs) = unpack_preamble_byte(preamble_byte)?;
        ensure_preamble_longs_in(&[PREAMBLE_LONGS_EMPTY], preamble_longs)?;
        if max_k < reservoir::MIN_K {
            return Err(Error::deserial("max_k must be at least 2").with_context("max_k", max_k));
        }

        if (flags & EMPTY_FLAG_MASK) != 0 {
            return Ok(ReservoirUnion::from_parts(max_k, None));
        }

        let gadget = ReservoirSketch::deserialize(&bytes[8..], serde)?;
        let gadget = if gadget.k() > max_k {
            gadget.downsampled_copy(max_k)?
        } else {
            gadget
        };
        Ok(ReservoirUnion::from_parts(max_k, Some(gadget)))
    }
}

// ============================================================================
// VarOpt sketch
// ============================================================================

impl<T: Clone> VarOptSketch<T> {
    /// Serializes the sketch using `serde` for the retained items.
    ///
    /// H-region weights come first, then packed marks when the sketch is a
    /// gadget variant, then the items (H region before R region).
    pub fn serialize<S: ItemsSerde<T>>(&self, serde: &S) -> Vec<u8> {
        let is_empty = self.is_empty();
        let preamble_longs = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else if self.r == 0 {
            VAROPT_PREAMBLE_LONGS_WARMUP
        } else {
            VAROPT_PREAMBLE_LONGS_FULL
        };

        let mut flags = 0u8;
        if is_empty {
            flags |= EMPTY_FLAG_MASK;
        }
        if self.marks.is_some() {
            flags |= GADGET_FLAG_MASK;
        }

        let mut bytes = SketchBytes::with_capacity(8 * preamble_longs as usize);
        bytes.write_u8(pack_preamble_byte(self.rf, preamble_longs));
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::VAROPT.id);
        bytes.write_u8(flags);
        bytes.write_u32_le(self.k);

        if is_empty {
            return bytes.into_bytes();
        }

        bytes.write_u64_le(self.n);
        bytes.write_u32_le(self.h as u32);
        bytes.write_u32_le(self.r as u32);
        if self.r > 0 {
            bytes.write_f64_le(self.total_wt_r);
        }

        for slot in 0..self.h {
            bytes.write_f64_le(self.weights[slot]);
        }
        if let Some(marks) = &self.marks {
            for chunk in marks[..self.h].chunks(8) {
                let mut packed = 0u8;
                for (bit, &mark) in chunk.iter().enumerate() {
                    if mark {
                        packed |= 1 << bit;
                    }
                }
                bytes.write_u8(packed);
            }
        }

        let mut items: Vec<T> = Vec::with_capacity(self.h + self.r);
        for slot in 0..self.h {
            if let Some(item) = &self.data[slot] {
                items.push(item.clone());
            }
        }
        if self.r > 0 {
            for slot in (self.h + 1)..(self.h + 1 + self.r) {
                if let Some(item) = &self.data[slot] {
                    items.push(item.clone());
                }
            }
        }
        bytes.write(&serde.serialize_items(&items));
        bytes.into_bytes()
    }

    /// Deserializes a sketch, reading items with `serde`.
    ///
    /// The decoder validates the full structure before constructing the
    /// sketch: region sizes against `k`, strictly positive finite H-region
    /// weights, and a positive finite R-region total.
    pub fn deserialize<S: ItemsSerde<T>>(bytes: &[u8], serde: &S) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let preamble_byte = cursor.read_u8().map_err(make_error("preamble_byte"))?;
        let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
        let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let k = cursor.read_u32_le().map_err(make_error("k"))?;

        Family::VAROPT.validate_id(family_id)?;
        ensure_serial_version_in(&[SERIAL_VERSION], serial_version)?;
        let (rf, preamble_longs) = unpack_preamble_byte(preamble_byte)?;
        if !(varopt::MIN_K..=varopt::MAX_K).contains(&k) {
            return Err(Error::deserial("k out of range").with_context("k", k));
        }

        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        let is_gadget = (flags & GADGET_FLAG_MASK) != 0;

        if is_empty {
            ensure_preamble_longs_in(&[PREAMBLE_LONGS_EMPTY], preamble_longs)?;
            return Ok(VarOptSketch::from_parts(
                k,
                rf,
                0,
                0,
                0,
                0.0,
                Vec::new(),
                Vec::new(),
                is_gadget.then(Vec::new),
            ));
        }

        let n = cursor.read_u64_le().map_err(make_error("n"))?;
        let h = cursor.read_u32_le().map_err(make_error("h"))? as usize;
        let r = cursor.read_u32_le().map_err(make_error("r"))? as usize;

        let expected_preamble = if r == 0 {
            VAROPT_PREAMBLE_LONGS_WARMUP
        } else {
            VAROPT_PREAMBLE_LONGS_FULL
        };
        ensure_preamble_longs_in(&[expected_preamble], preamble_longs)?;

        let total_wt_r = if r > 0 {
            let total = cursor.read_f64_le().map_err(make_error("total_wt_r"))?;
            if !(total.is_finite() && total > 0.0) {
                return Err(Error::deserial("R-region weight must be positive and finite")
                    .with_context("total_wt_r", total));
            }
            total
        } else {
            0.0
        };

        if r == 0 {
            if h > k as usize {
                return Err(Error::deserial("H region larger than k").with_context("h", h));
            }
        } else if h + r != k as usize {
            return Err(Error::deserial("region sizes must sum to k")
                .with_context("h", h)
                .with_context("r", r)
                .with_context("k", k));
        }
        if n < (h + r) as u64 {
            return Err(Error::deserial("item count below retained samples")
                .with_context("n", n));
        }

        if ((bytes.len() - cursor.position()) as u64) < h as u64 * 8 {
            return Err(Error::insufficient_data("weights"));
        }
        let mut h_weights = Vec::with_capacity(h);
        for _ in 0..h {
            let weight = cursor.read_f64_le().map_err(make_error("weight"))?;
            if !(weight.is_finite() && weight > 0.0) {
                return Err(Error::deserial("H-region weight must be positive and finite")
                    .with_context("weight", weight));
            }
            h_weights.push(weight);
        }

        let marks = if is_gadget {
            let num_bytes = h.div_ceil(8);
            let mut packed = vec![0u8; num_bytes];
            cursor.read_exact(&mut packed).map_err(make_error("marks"))?;
            let mut marks = Vec::with_capacity(h);
            for bit in 0..h {
                marks.push(packed[bit / 8] & (1 << (bit % 8)) != 0);
            }
            Some(marks)
        } else {
            None
        };

        let (items, _) = serde.deserialize_items(&bytes[cursor.position()..], h + r)?;
        if items.len() != h + r {
            return Err(Error::deserial("item count mismatch"));
        }

        let mut items = items.into_iter();
        let mut data: Vec<Option<T>> = Vec::with_capacity(if r > 0 { k as usize + 1 } else { h });
        let mut weights = h_weights;
        for _ in 0..h {
            data.push(items.next());
        }
        let marks = if r > 0 {
            // restore the gap slot between the regions
            data.push(None);
            weights.push(-1.0);
            for _ in 0..r {
                data.push(items.next());
                weights.push(-1.0);
            }
            marks.map(|mut m| {
                m.resize(k as usize + 1, false);
                m
            })
        } else {
            marks
        };

        Ok(VarOptSketch::from_parts(
            k, rf, n, h, r, total_wt_r, data, weights, marks,
        ))
    }
}
