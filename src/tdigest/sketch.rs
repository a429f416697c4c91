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

use std::cmp::Ordering;

use crate::error::Error;
use crate::tdigest::DEFAULT_K;

const BUFFER_MULTIPLIER: usize = 4;
const MIN_K: u16 = 10;

/// T-Digest sketch for estimating quantiles and ranks.
///
/// See the [module documentation](super) for more details.
#[derive(Debug, Clone, PartialEq)]
pub struct TDigest {
    pub(super) k: u16,

    pub(super) reverse_merge: bool,
    pub(super) min: f64,
    pub(super) max: f64,

    pub(super) centroids: Vec<Centroid>,
    pub(super) centroids_weight: u64,
    centroids_capacity: usize,
    pub(super) buffer: Vec<f64>,
}

impl Default for TDigest {
    fn default() -> Self {
        TDigest::new_validated(DEFAULT_K)
    }
}

impl TDigest {
    /// Creates a t-Digest with the given compression parameter.
    ///
    /// Larger `k` gives better accuracy at the cost of more centroids;
    /// the centroid count is bounded by roughly `2 * k`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// if `k < 10`.
    pub fn new(k: u16) -> Result<Self, Error> {
        if k < MIN_K {
            return Err(Error::invalid_argument("k must be at least 10").with_context("k", k));
        }
        Ok(Self::new_validated(k))
    }

    pub(super) fn new_validated(k: u16) -> Self {
        let centroids_capacity = centroids_capacity(k);
        TDigest {
            k,
            reverse_merge: false,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            centroids: Vec::with_capacity(centroids_capacity),
            centroids_weight: 0,
            centroids_capacity,
            buffer: Vec::with_capacity(centroids_capacity * BUFFER_MULTIPLIER),
        }
    }

    /// Reassembles a sketch from decoded envelope fields.
    pub(super) fn make(
        k: u16,
        reverse_merge: bool,
        min: f64,
        max: f64,
        centroids: Vec<Centroid>,
        centroids_weight: u64,
        buffer: Vec<f64>,
    ) -> Self {
        let centroids_capacity = centroids_capacity(k);
        TDigest {
            k,
            reverse_merge,
            min,
            max,
            centroids,
            centroids_weight,
            centroids_capacity,
            buffer,
        }
    }

    /// Updates this t-Digest with the given value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidInput`](crate::error::ErrorKind::InvalidInput)
    /// for NaN; the sketch is not modified.
    pub fn update(&mut self, value: f64) -> Result<(), Error> {
        if value.is_nan() {
            return Err(Error::invalid_input("NaN values cannot be represented"));
        }

        if self.buffer.len() == self.centroids_capacity * BUFFER_MULTIPLIER {
            self.compress();
        }

        self.buffer.push(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    /// Merges another t-Digest into this one.
    ///
    /// The other sketch's buffered values and centroids are absorbed in a
    /// single compression pass; this sketch keeps its own `k`.
    pub fn merge(&mut self, other: &TDigest) {
        if other.is_empty() {
            return;
        }
        let mut incoming = Vec::with_capacity(
            self.buffer.len() + other.buffer.len() + other.centroids.len(),
        );
        for &value in &self.buffer {
            incoming.push(Centroid {
                mean: value,
                weight: 1,
            });
        }
        for &value in &other.buffer {
            incoming.push(Centroid {
                mean: value,
                weight: 1,
            });
        }
        incoming.extend_from_slice(&other.centroids);
        let added_weight =
            self.buffer.len() as u64 + other.buffer.len() as u64 + other.centroids_weight;

        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.merge_centroids(incoming, added_weight);
    }

    /// Compression parameter.
    pub fn k(&self) -> u16 {
        self.k
    }

    /// Returns true if the t-Digest has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty() && self.buffer.is_empty()
    }

    /// Returns the minimum value seen.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptySketch`](crate::error::ErrorKind::EmptySketch)
    /// on an empty sketch.
    pub fn min_value(&self) -> Result<f64, Error> {
        if self.is_empty() {
            return Err(Error::empty_sketch("min is undefined for an empty sketch"));
        }
        Ok(self.min)
    }

    /// Returns the maximum value seen.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptySketch`](crate::error::ErrorKind::EmptySketch)
    /// on an empty sketch.
    pub fn max_value(&self) -> Result<f64, Error> {
        if self.is_empty() {
            return Err(Error::empty_sketch("max is undefined for an empty sketch"));
        }
        Ok(self.max)
    }

    /// Returns the total weight absorbed so far.
    pub fn total_weight(&self) -> u64 {
        self.centroids_weight + self.buffer.len() as u64
    }

    /// Computes the approximate normalized rank of the given value.
    ///
    /// Compresses buffered values first.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptySketch`](crate::error::ErrorKind::EmptySketch)
    /// on an empty sketch and
    /// [`ErrorKind::InvalidInput`](crate::error::ErrorKind::InvalidInput) for NaN.
    pub fn rank(&mut self, value: f64) -> Result<f64, Error> {
        if value.is_nan() {
            return Err(Error::invalid_input("rank is undefined for NaN"));
        }
        if self.is_empty() {
            return Err(Error::empty_sketch("rank is undefined for an empty sketch"));
        }
        if value < self.min {
            return Ok(0.0);
        }
        if value > self.max {
            return Ok(1.0);
        }
        // one observation, so min == max == value
        if self.centroids.len() + self.buffer.len() == 1 {
            return Ok(0.5);
        }

        self.compress();
        let total = self.centroids_weight as f64;

        // left tail
        let first = self.centroids[0];
        if value < first.mean {
            if first.mean - self.min > 0.0 {
                if value == self.min {
                    return Ok(0.5 / total);
                }
                return Ok((1.0
                    + (value - self.min) / (first.mean - self.min)
                        * (first.weight as f64 / 2.0 - 1.0))
                    / total);
            }
            return Ok(0.0);
        }

        // right tail
        let last = self.centroids[self.centroids.len() - 1];
        if value > last.mean {
            if self.max - last.mean > 0.0 {
                if value == self.max {
                    return Ok(1.0 - 0.5 / total);
                }
                return Ok(1.0
                    - (1.0
                        + (self.max - value) / (self.max - last.mean)
                            * (last.weight as f64 / 2.0 - 1.0))
                        / total);
            }
            return Ok(1.0);
        }

        // interior: bracket the value between centroids
        let mut lower = self.centroids.partition_point(|c| c.mean < value);
        if value < self.centroids[lower].mean {
            lower -= 1;
        }
        let mut upper = self.centroids.partition_point(|c| c.mean <= value);
        if upper == self.centroids.len() || self.centroids[upper - 1].mean >= value {
            upper -= 1;
        }

        let mut weight_below = 0.0;
        for centroid in &self.centroids[..lower] {
            weight_below += centroid.weight as f64;
        }
        weight_below += self.centroids[lower].weight as f64 / 2.0;

        let mut weight_delta = 0.0;
        for centroid in &self.centroids[lower..upper] {
            weight_delta += centroid.weight as f64;
        }
        weight_delta -= self.centroids[lower].weight as f64 / 2.0;
        weight_delta += self.centroids[upper].weight as f64 / 2.0;

        let lower_mean = self.centroids[lower].mean;
        let upper_mean = self.centroids[upper].mean;
        if upper_mean - lower_mean > 0.0 {
            Ok((weight_below + weight_delta * (value - lower_mean) / (upper_mean - lower_mean))
                / total)
        } else {
            Ok((weight_below + weight_delta / 2.0) / total)
        }
    }

    /// Computes the approximate value at the given normalized rank.
    ///
    /// Compresses buffered values first.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptySketch`](crate::error::ErrorKind::EmptySketch)
    /// on an empty sketch and
    /// [`ErrorKind::InvalidInput`](crate::error::ErrorKind::InvalidInput) for a
    /// rank outside `[0.0, 1.0]`.
    pub fn quantile(&mut self, rank: f64) -> Result<f64, Error> {
        if !(0.0..=1.0).contains(&rank) {
            return Err(Error::invalid_input("rank must be in [0.0, 1.0]")
                .with_context("rank", rank));
        }
        if self.is_empty() {
            return Err(Error::empty_sketch(
                "quantile is undefined for an empty sketch",
            ));
        }
        self.compress();
        if self.centroids.len() == 1 {
            return Ok(self.centroids[0].mean);
        }

        // at least 2 clusters from here on
        let total = self.centroids_weight as f64;
        let target = rank * total;
        if target < 1.0 {
            return Ok(self.min);
        }
        if target > total - 1.0 {
            return Ok(self.max);
        }

        let first = self.centroids[0];
        let half_first = first.weight as f64 / 2.0;
        if first.weight > 1 && target < half_first {
            // leading tail: stretch [1, w/2) onto [min, first mean)
            let stretch = (first.mean - self.min) / (half_first - 1.0);
            return Ok(self.min + (target - 1.0) * stretch);
        }
        let last = self.centroids[self.centroids.len() - 1];
        let half_last = last.weight as f64 / 2.0;
        if last.weight > 1 && total - target <= half_last {
            let stretch = (self.max - last.mean) / (half_last - 1.0);
            return Ok(self.max - (total - target - 1.0) * stretch);
        }

        // walk the cumulative weight at cluster midpoints until the pair of
        // centers straddling the target is found
        let mut center = half_first;
        for pair in self.centroids.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            let span = (left.weight + right.weight) as f64 / 2.0;
            if center + span > target {
                let mut from_left = target - center;
                let mut to_right = center + span - target;
                // a unit-weight cluster covers half a unit on each side
                if left.weight == 1 {
                    if from_left < 0.5 {
                        return Ok(left.mean);
                    }
                    from_left -= 0.5;
                }
                if right.weight == 1 {
                    if to_right <= 0.5 {
                        return Ok(right.mean);
                    }
                    to_right -= 0.5;
                }
                return Ok(
                    (left.mean * to_right + right.mean * from_left) / (from_left + to_right)
                );
            }
            center += span;
        }

        // past the last center: blend toward the maximum
        let overshoot = target - (total - half_last);
        Ok((last.mean * (half_last - overshoot) + self.max * overshoot) / half_last)
    }

    /// Returns the cumulative distribution at each split point, with a
    /// trailing 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptySketch`](crate::error::ErrorKind::EmptySketch)
    /// on an empty sketch and
    /// [`ErrorKind::InvalidInput`](crate::error::ErrorKind::InvalidInput) for
    /// non-finite or non-increasing split points.
    pub fn cdf(&mut self, split_points: &[f64]) -> Result<Vec<f64>, Error> {
        if self.is_empty() {
            return Err(Error::empty_sketch("cdf is undefined for an empty sketch"));
        }
        validate_split_points(split_points)?;
        let mut ranks = Vec::with_capacity(split_points.len() + 1);
        for &split in split_points {
            ranks.push(self.rank(split)?);
        }
        ranks.push(1.0);
        Ok(ranks)
    }

    /// Returns the probability mass between consecutive split points.
    ///
    /// # Errors
    ///
    /// Same conditions as [`cdf`](Self::cdf).
    pub fn pmf(&mut self, split_points: &[f64]) -> Result<Vec<f64>, Error> {
        let cdf = self.cdf(split_points)?;
        let mut pmf = cdf;
        for i in (1..pmf.len()).rev() {
            pmf[i] -= pmf[i - 1];
        }
        Ok(pmf)
    }

    /// Processes buffered values, merging centroids as needed.
    pub(super) fn compress(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut incoming = Vec::with_capacity(self.buffer.len() + self.centroids.len());
        for &value in &self.buffer {
            incoming.push(Centroid {
                mean: value,
                weight: 1,
            });
        }
        let added_weight = self.buffer.len() as u64;
        self.merge_centroids(incoming, added_weight);
    }

    /// Merges the incoming centroids with the existing ones.
    ///
    /// `incoming` must be non-empty and free of NaN means; the internal
    /// buffer is cleared afterwards.
    fn merge_centroids(&mut self, mut incoming: Vec<Centroid>, added_weight: u64) {
        incoming.extend(std::mem::take(&mut self.centroids));
        incoming.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap_or(Ordering::Equal));
        if self.reverse_merge {
            incoming.reverse();
        }
        self.centroids_weight += added_weight;
        let total = self.centroids_weight as f64;
        let final_pos = incoming.len() - 1;

        // accumulate candidates into an open cluster, closing it whenever the
        // k_2 budget at its position is exhausted
        let mut merged = Vec::with_capacity(self.centroids_capacity);
        let mut open = incoming[0];
        let mut closed_weight = 0.0;
        for (pos, cand) in incoming.iter().enumerate().skip(1) {
            let grown = (open.weight + cand.weight) as f64;
            // the first and last inputs always open their own cluster, which
            // pins the extremes of the digest
            let fits = pos != 1 && pos != final_pos && {
                let q_low = closed_weight / total;
                let q_high = (closed_weight + grown) / total;
                grown
                    <= self
                        .cluster_weight_limit(q_low, total)
                        .min(self.cluster_weight_limit(q_high, total))
            };
            if fits {
                // fold the candidate in, keeping the weighted mean exact
                open.weight += cand.weight;
                open.mean += (cand.mean - open.mean) * cand.weight as f64 / open.weight as f64;
            } else {
                closed_weight += open.weight as f64;
                merged.push(open);
                open = *cand;
            }
        }
        merged.push(open);

        if self.reverse_merge {
            merged.reverse();
        }
        self.min = self.min.min(merged[0].mean);
        self.max = self.max.max(merged[merged.len() - 1].mean);
        self.centroids = merged;
        self.reverse_merge = !self.reverse_merge;
        self.buffer.clear();
    }

    /// Largest cluster weight the k_2 scale function grants at normalized
    /// position `q`: proportional to `q * (1 - q)`, so resolution
    /// concentrates at the tails while the cluster count stays bounded.
    fn cluster_weight_limit(&self, q: f64, total: f64) -> f64 {
        let delta = 2.0 * self.k as f64;
        let growth = 4.0 * (total / delta).ln() + 24.0;
        total * q * (1.0 - q) * growth / delta
    }
}

fn validate_split_points(split_points: &[f64]) -> Result<(), Error> {
    for pair in split_points.windows(2) {
        if !(pair[0] < pair[1]) {
            return Err(Error::invalid_input(
                "split points must be unique and monotonically increasing",
            ));
        }
    }
    if split_points.iter().any(|split| !split.is_finite()) {
        return Err(Error::invalid_input("split points must be finite"));
    }
    Ok(())
}

fn centroids_capacity(k: u16) -> usize {
    let fudge = if k < 30 { 30 } else { 10 };
    2 * k as usize + fudge
}

/// Weighted centroid of merged observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Centroid {
    pub(super) mean: f64,
    pub(super) weight: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_too_small_is_rejected() {
        assert!(TDigest::new(9).is_err());
        assert!(TDigest::new(10).is_ok());
    }

    #[test]
    fn test_centroid_count_is_bounded() {
        let k = 100_u16;
        let mut sketch = TDigest::new(k).unwrap();
        for i in 0..100_000 {
            sketch.update(i as f64).unwrap();
        }
        sketch.compress();
        assert!(sketch.centroids.len() <= 2 * k as usize + 10);
    }

    #[test]
    fn test_reverse_merge_flag_alternates() {
        let mut sketch = TDigest::new(50).unwrap();
        sketch.update(1.0).unwrap();
        assert!(!sketch.reverse_merge);
        sketch.compress();
        assert!(sketch.reverse_merge);
        sketch.update(2.0).unwrap();
        sketch.compress();
        assert!(!sketch.reverse_merge);
    }

    #[test]
    fn test_nan_update_does_not_mutate() {
        let mut sketch = TDigest::new(100).unwrap();
        assert!(sketch.update(f64::NAN).is_err());
        assert!(sketch.is_empty());
        assert_eq!(sketch.total_weight(), 0);
    }
}
