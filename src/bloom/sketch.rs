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

use crate::bloom::BloomHashable;
use crate::common::bitarray;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::hash::DEFAULT_UPDATE_SEED;

pub(super) const MIN_NUM_BITS: u64 = 64;
// The envelope stores the word count as u32 alongside a 4-long preamble.
pub(super) const MAX_NUM_BITS: u64 = (i32::MAX as u64 - 4) * 64;

/// A Bloom filter for probabilistic set membership testing.
///
/// Provides fast membership queries with:
/// - No false negatives (inserted items always return `true`)
/// - Tunable false positive rate
/// - Constant space usage
///
/// Use [`BloomFilterBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
    /// Hash seed shared by all hash indices
    pub(super) seed: u64,
    /// Number of hash indices per item (k)
    pub(super) num_hashes: u16,
    /// Total number of bits in the filter (m), always a multiple of 64
    pub(super) capacity_bits: u64,
    /// Count of bits set to 1
    pub(super) num_bits_set: u64,
    /// Bit array packed into u64 words, length = capacity_bits / 64
    pub(super) bit_array: Vec<u64>,
}

impl BloomFilter {
    /// Returns a builder for creating a Bloom filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamsketches::bloom::BloomFilterBuilder;
    ///
    /// // By accuracy (recommended)
    /// let filter = BloomFilterBuilder::with_accuracy(1000, 0.01).build().unwrap();
    ///
    /// // By size (manual)
    /// let filter = BloomFilterBuilder::with_size(10_000, 7).build().unwrap();
    /// ```
    pub fn builder() -> BloomFilterBuilder {
        BloomFilterBuilder::default()
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether an item is possibly in the set.
    ///
    /// Returns:
    /// - `true`: Item was **possibly** inserted (or false positive)
    /// - `false`: Item was **definitely not** inserted
    ///
    /// Querying an empty filter, an empty string, or an empty slice always
    /// returns `false`.
    pub fn query<T: BloomHashable + ?Sized>(&self, item: &T) -> bool {
        if self.is_empty() {
            return false;
        }
        match item.base_hashes(self.seed) {
            Some((h0, h1)) => self.check_bits(h0, h1),
            None => false,
        }
    }

    /// Tests and inserts an item in a single pass over its bit positions.
    ///
    /// Returns whether the item was possibly already in the set before
    /// insertion, which is more efficient than `query()` then `update()`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamsketches::bloom::BloomFilterBuilder;
    /// let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
    ///
    /// assert!(!filter.query_and_update(&"apple"));
    /// assert!(filter.query_and_update(&"apple"));
    /// ```
    pub fn query_and_update<T: BloomHashable + ?Sized>(&mut self, item: &T) -> bool {
        let Some((h0, h1)) = item.base_hashes(self.seed) else {
            return false;
        };
        let mut newly_set = 0u64;
        for i in 1..=self.num_hashes {
            let bit_index = self.bit_index(h0, h1, i);
            if bitarray::set_bit(&mut self.bit_array, bit_index) {
                newly_set += 1;
            }
        }
        self.num_bits_set += newly_set;
        newly_set == 0
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts an item into the filter.
    ///
    /// After insertion, `query(item)` always returns `true`. Updating with
    /// an empty string or empty slice is a no-op.
    pub fn update<T: BloomHashable + ?Sized>(&mut self, item: &T) {
        let Some((h0, h1)) = item.base_hashes(self.seed) else {
            return;
        };
        for i in 1..=self.num_hashes {
            let bit_index = self.bit_index(h0, h1, i);
            if bitarray::set_bit(&mut self.bit_array, bit_index) {
                self.num_bits_set += 1;
            }
        }
    }

    /// Resets the filter to its initial empty state.
    ///
    /// Clears all bits while preserving capacity and configuration.
    pub fn reset(&mut self) {
        for word in &mut self.bit_array {
            *word = 0;
        }
        self.num_bits_set = 0;
    }

    // ========================================================================
    // Set Operations
    // ========================================================================

    /// Merges another filter into this one via bitwise OR (union).
    ///
    /// After merging, this filter recognizes items from either filter (plus
    /// any false positives from either). Returns the new count of set bits.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`] if the filters differ in
    /// seed, hash count, or capacity.
    pub fn union(&mut self, other: &BloomFilter) -> Result<u64, Error> {
        self.ensure_compatible(other)?;
        bitarray::union_with(&mut self.bit_array, &other.bit_array);
        self.num_bits_set = bitarray::popcount(&self.bit_array);
        Ok(self.num_bits_set)
    }

    /// Intersects this filter with another via bitwise AND.
    ///
    /// After intersection, this filter recognizes only items present in both
    /// filters (plus false positives). Returns the new count of set bits.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::IncompatibleSketch`] if the filters differ in
    /// seed, hash count, or capacity.
    pub fn intersect(&mut self, other: &BloomFilter) -> Result<u64, Error> {
        self.ensure_compatible(other)?;
        bitarray::intersect(&mut self.bit_array, &other.bit_array);
        self.num_bits_set = bitarray::popcount(&self.bit_array);
        Ok(self.num_bits_set)
    }

    /// Inverts all bits in the filter, returning the new count of set bits.
    ///
    /// This approximately inverts the notion of set membership, though the
    /// false positive guarantees no longer hold in a well-defined way.
    pub fn invert(&mut self) -> u64 {
        bitarray::invert(&mut self.bit_array);
        self.num_bits_set = self.capacity_bits - self.num_bits_set;
        self.num_bits_set
    }

    // ========================================================================
    // Statistics and Properties
    // ========================================================================

    /// Returns whether the filter is empty (no bits set).
    pub fn is_empty(&self) -> bool {
        self.num_bits_set == 0
    }

    /// Returns the number of bits set to 1.
    pub fn bits_used(&self) -> u64 {
        self.num_bits_set
    }

    /// Returns the total number of bits in the filter (capacity).
    pub fn capacity(&self) -> u64 {
        self.capacity_bits
    }

    /// Returns the number of hash indices used per item.
    pub fn num_hashes(&self) -> u16 {
        self.num_hashes
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the current load factor (fraction of bits set).
    ///
    /// Values above 0.5 indicate degraded false positive rates.
    pub fn load_factor(&self) -> f64 {
        self.num_bits_set as f64 / self.capacity_bits as f64
    }

    /// Estimates the current false positive probability from the load
    /// factor, assuming uniform bit distribution.
    pub fn estimated_fpp(&self) -> f64 {
        self.load_factor().powi(self.num_hashes as i32)
    }

    /// Checks if two filters are compatible for set algebra.
    ///
    /// Filters are compatible if they share capacity, hash count, and seed.
    pub fn is_compatible(&self, other: &BloomFilter) -> bool {
        self.capacity_bits == other.capacity_bits
            && self.num_hashes == other.num_hashes
            && self.seed == other.seed
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn ensure_compatible(&self, other: &BloomFilter) -> Result<(), Error> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::IncompatibleSketch,
                "filters must share seed, hash count, and capacity",
            )
            .with_context("self_capacity", self.capacity_bits)
            .with_context("other_capacity", other.capacity_bits)
            .with_context("self_hashes", self.num_hashes)
            .with_context("other_hashes", other.num_hashes))
        }
    }

    /// Checks if all k bits are set for the given base hashes.
    fn check_bits(&self, h0: u64, h1: u64) -> bool {
        for i in 1..=self.num_hashes {
            if !bitarray::get_bit(&self.bit_array, self.bit_index(h0, h1, i)) {
                return false;
            }
        }
        true
    }

    /// Computes the i-th bit index via double hashing.
    ///
    /// The right shift before the modulo is part of the cross-language
    /// format and must not be dropped.
    fn bit_index(&self, h0: u64, h1: u64, i: u16) -> u64 {
        (h0.wrapping_add(u64::from(i).wrapping_mul(h1)) >> 1) % self.capacity_bits
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating [`BloomFilter`] instances.
///
/// Provides two construction modes:
/// - [`with_accuracy()`](Self::with_accuracy): target item count and false
///   positive rate (recommended)
/// - [`with_size()`](Self::with_size): exact bit count and hash functions
#[derive(Debug, Clone)]
pub struct BloomFilterBuilder {
    params: Option<Params>,
    seed: u64,
}

#[derive(Debug, Clone, Copy)]
enum Params {
    Accuracy { max_items: u64, fpp: f64 },
    Size { num_bits: u64, num_hashes: u16 },
}

impl Default for BloomFilterBuilder {
    fn default() -> Self {
        BloomFilterBuilder {
            params: None,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl BloomFilterBuilder {
    /// Creates a builder with optimal parameters for a target accuracy.
    ///
    /// The number of bits and hash functions are derived from the expected
    /// number of distinct items and the desired false positive probability.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamsketches::bloom::BloomFilterBuilder;
    /// let filter = BloomFilterBuilder::with_accuracy(10_000, 0.01)
    ///     .seed(42)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn with_accuracy(max_items: u64, fpp: f64) -> Self {
        BloomFilterBuilder {
            params: Some(Params::Accuracy { max_items, fpp }),
            seed: DEFAULT_UPDATE_SEED,
        }
    }

    /// Creates a builder with manual size specification.
    ///
    /// `num_bits` is rounded up to the next multiple of 64.
    pub fn with_size(num_bits: u64, num_hashes: u16) -> Self {
        BloomFilterBuilder {
            params: Some(Params::Size {
                num_bits,
                num_hashes,
            }),
            seed: DEFAULT_UPDATE_SEED,
        }
    }

    /// Sets a custom hash seed (default: 9001).
    ///
    /// Filters with different seeds cannot be merged.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the Bloom filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`] when no construction mode was
    /// chosen, when `num_bits` is zero or above the envelope maximum, when
    /// `num_hashes` is zero, when `max_items` is zero, or when `fpp` is
    /// outside `(0, 1)`.
    pub fn build(self) -> Result<BloomFilter, Error> {
        let (num_bits, num_hashes) = match self.params {
            None => {
                return Err(Error::invalid_argument(
                    "either with_accuracy() or with_size() is required",
                ));
            }
            Some(Params::Accuracy { max_items, fpp }) => {
                if max_items == 0 {
                    return Err(Error::invalid_argument("max_items must be greater than 0"));
                }
                if !(fpp > 0.0 && fpp < 1.0) {
                    return Err(Error::invalid_argument(
                        "fpp must be between 0.0 and 1.0 (exclusive)",
                    )
                    .with_context("fpp", fpp));
                }
                let num_bits = Self::suggest_num_bits(max_items, fpp);
                (num_bits, Self::suggest_num_hashes(max_items, num_bits))
            }
            Some(Params::Size {
                num_bits,
                num_hashes,
            }) => (num_bits, num_hashes),
        };

        if num_bits == 0 {
            return Err(Error::invalid_argument("num_bits must be greater than 0"));
        }
        if num_bits > MAX_NUM_BITS {
            return Err(Error::invalid_argument("num_bits above envelope maximum")
                .with_context("num_bits", num_bits)
                .with_context("max", MAX_NUM_BITS));
        }
        if num_hashes == 0 {
            return Err(Error::invalid_argument("num_hashes must be at least 1"));
        }

        let capacity_bits = num_bits.div_ceil(64) * 64;
        let num_words = (capacity_bits / 64) as usize;

        Ok(BloomFilter {
            seed: self.seed,
            num_hashes,
            capacity_bits,
            num_bits_set: 0,
            bit_array: vec![0u64; num_words],
        })
    }

    // ========================================================================
    // Static Suggestion Methods
    // ========================================================================

    /// Suggests the number of bits for a target item count and FPP.
    ///
    /// Formula: `m = ceil(-n * ln(p) / ln(2)^2)`.
    pub fn suggest_num_bits(max_items: u64, fpp: f64) -> u64 {
        let n = max_items as f64;
        let ln2_squared = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        (-n * fpp.ln() / ln2_squared).ceil() as u64
    }

    /// Suggests the number of hash functions for an item count and bit count.
    ///
    /// Formula: `k = max(1, ceil((m/n) * ln(2)))`.
    pub fn suggest_num_hashes(max_items: u64, num_bits: u64) -> u16 {
        let k = (num_bits as f64 / max_items as f64 * std::f64::consts::LN_2).ceil();
        (k as u64).clamp(1, u16::MAX as u64) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_with_accuracy() {
        let filter = BloomFilterBuilder::with_accuracy(1000, 0.01).build().unwrap();
        assert!(filter.capacity() >= 9585);
        assert_eq!(filter.capacity() % 64, 0);
        assert_eq!(filter.num_hashes(), 7);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_builder_with_size_rounds_up() {
        let filter = BloomFilterBuilder::with_size(1000, 5).build().unwrap();
        assert_eq!(filter.capacity(), 1024);
        assert_eq!(filter.num_hashes(), 5);
    }

    #[test]
    fn test_builder_rejects_bad_parameters() {
        assert!(BloomFilterBuilder::default().build().is_err());
        assert!(BloomFilterBuilder::with_size(0, 5).build().is_err());
        assert!(BloomFilterBuilder::with_size(1024, 0).build().is_err());
        assert!(BloomFilterBuilder::with_size(MAX_NUM_BITS + 64, 3).build().is_err());
        assert!(BloomFilterBuilder::with_accuracy(0, 0.01).build().is_err());
        assert!(BloomFilterBuilder::with_accuracy(100, 0.0).build().is_err());
        assert!(BloomFilterBuilder::with_accuracy(100, 1.0).build().is_err());
        assert!(BloomFilterBuilder::with_accuracy(100, f64::NAN).build().is_err());
    }

    #[test]
    fn test_update_and_query() {
        let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
        assert!(!filter.query(&"apple"));
        filter.update(&"apple");
        assert!(filter.query(&"apple"));
        assert!(!filter.is_empty());
    }

    #[test]
    fn test_empty_string_is_noop() {
        let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
        filter.update(&"");
        assert!(filter.is_empty());
        assert!(!filter.query(&""));
        filter.update(&"x");
        assert!(!filter.query(&""));
    }

    #[test]
    fn test_query_and_update() {
        let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
        assert!(!filter.query_and_update(&42_u64));
        assert!(filter.query_and_update(&42_u64));
        assert!(filter.query(&42_u64));
    }

    #[test]
    fn test_reset() {
        let mut filter = BloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
        filter.update(&"test");
        filter.reset();
        assert!(filter.is_empty());
        assert!(!filter.query(&"test"));
    }

    #[test]
    fn test_union() {
        let mut f1 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
        let mut f2 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
        f1.update(&"a");
        f2.update(&"b");

        let bits = f1.union(&f2).unwrap();
        assert_eq!(bits, f1.bits_used());
        assert!(f1.query(&"a"));
        assert!(f1.query(&"b"));
    }

    #[test]
    fn test_intersect() {
        let mut f1 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
        let mut f2 = BloomFilterBuilder::with_accuracy(100, 0.01).seed(123).build().unwrap();
        f1.update(&"a");
        f1.update(&"b");
        f2.update(&"b");
        f2.update(&"c");

        f1.intersect(&f2).unwrap();
        assert!(f1.query(&"b"));
    }

    #[test]
    fn test_incompatible_operands() {
        let mut f1 = BloomFilterBuilder::with_size(1024, 3).seed(1).build().unwrap();
        let f2 = BloomFilterBuilder::with_size(1024, 3).seed(2).build().unwrap();
        let f3 = BloomFilterBuilder::with_size(2048, 3).seed(1).build().unwrap();
        let f4 = BloomFilterBuilder::with_size(1024, 4).seed(1).build().unwrap();

        assert_eq!(f1.union(&f2).unwrap_err().kind(), ErrorKind::IncompatibleSketch);
        assert_eq!(f1.intersect(&f3).unwrap_err().kind(), ErrorKind::IncompatibleSketch);
        assert_eq!(f1.union(&f4).unwrap_err().kind(), ErrorKind::IncompatibleSketch);
    }

    #[test]
    fn test_invert_is_involution() {
        let mut filter = BloomFilterBuilder::with_size(1024, 3).build().unwrap();
        filter.update(&1_u64);
        filter.update(&2_u64);
        let words = filter.bit_array.clone();
        let used = filter.bits_used();

        let inverted = filter.invert();
        assert_eq!(inverted, 1024 - used);
        filter.invert();
        assert_eq!(filter.bit_array, words);
        assert_eq!(filter.bits_used(), used);
    }

    #[test]
    fn test_popcount_tracks_bits() {
        let mut filter = BloomFilterBuilder::with_size(4096, 5).build().unwrap();
        for i in 0..100_u64 {
            filter.update(&i);
            assert_eq!(
                filter.bits_used(),
                bitarray::popcount(&filter.bit_array)
            );
        }
    }
}
