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

use crate::hash::XxHash64;
use crate::hash::xxhash64;

/// Types that the Bloom filter can hash in a cross-language stable way.
///
/// Two base hashes are derived per item: `h0` from the filter seed and `h1`
/// from `h0`. 64-bit integers take a fixed single-lane XxHash64 path; all
/// other inputs are hashed over their little-endian serialization.
///
/// Empty strings, byte slices, and arrays produce no hashes: updating with
/// them is a no-op and querying them always returns `false`.
pub trait BloomHashable {
    /// Returns `(h0, h1)`, or `None` for inputs with no representation.
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)>;
}

impl BloomHashable for u64 {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        let h0 = XxHash64::hash_u64(*self, seed);
        let h1 = XxHash64::hash_u64(*self, h0);
        Some((h0, h1))
    }
}

impl BloomHashable for i64 {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        (*self as u64).base_hashes(seed)
    }
}

impl BloomHashable for f64 {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        canonical_f64_bits(*self).to_le_bytes().base_hashes(seed)
    }
}

impl BloomHashable for [u8] {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        if self.is_empty() {
            return None;
        }
        let h0 = xxhash64(self, seed);
        let h1 = xxhash64(self, h0);
        Some((h0, h1))
    }
}

impl<const N: usize> BloomHashable for [u8; N] {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        self.as_slice().base_hashes(seed)
    }
}

impl BloomHashable for str {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        self.as_bytes().base_hashes(seed)
    }
}

impl BloomHashable for String {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        self.as_str().base_hashes(seed)
    }
}

impl BloomHashable for [i64] {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        let mut bytes = Vec::with_capacity(self.len() * 8);
        for value in self {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.as_slice().base_hashes(seed)
    }
}

impl BloomHashable for [u64] {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        let mut bytes = Vec::with_capacity(self.len() * 8);
        for value in self {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.as_slice().base_hashes(seed)
    }
}

impl BloomHashable for [f64] {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        let mut bytes = Vec::with_capacity(self.len() * 8);
        for value in self {
            bytes.extend_from_slice(&canonical_f64_bits(*value).to_le_bytes());
        }
        bytes.as_slice().base_hashes(seed)
    }
}

impl<T: BloomHashable + ?Sized> BloomHashable for &T {
    fn base_hashes(&self, seed: u64) -> Option<(u64, u64)> {
        (**self).base_hashes(seed)
    }
}

/// Canonical bit pattern so that equal-comparing floats hash identically.
///
/// `+0.0` and `-0.0` collapse to positive zero and every NaN collapses to
/// the quiet NaN pattern `0x7ff8000000000000`.
fn canonical_f64_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        0x7ff8000000000000
    } else {
        value.to_bits()
    }
}
