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

use crate::common::bounds;
use crate::common::random::RandomSource;
use crate::common::random::XorShift64;
use crate::common::resize;
use crate::common::resize::ResizeFactor;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::sampling::MAX_ITEMS_SEEN;
use crate::sampling::SubsetSumEstimate;

/// Minimum sample capacity.
pub(super) const MIN_K: u32 = 2;

/// Uniform random sample of at most `k` items from a stream.
///
/// While fewer than `k` items have been observed the sketch holds every
/// item exactly. Beyond that, each incoming item replaces a random slot
/// with probability `k / n`, which keeps every observed item equally
/// likely to be retained. The order of the stored samples carries no
/// meaning.
///
/// # Usage
///
/// ```rust
/// use streamsketches::sampling::ReservoirSketch;
///
/// let mut sketch = ReservoirSketch::new(10).unwrap();
/// for i in 1..=5_u64 {
///     sketch.update(i).unwrap();
/// }
/// assert_eq!(sketch.n(), 5);
/// assert_eq!(sketch.samples().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ReservoirSketch<T> {
    pub(super) k: u32,
    pub(super) n: u64,
    pub(super) rf: ResizeFactor,
    curr_items_alloc: usize,
    pub(super) data: Vec<T>,
    rng: XorShift64,
}

impl<T> ReservoirSketch<T> {
    /// Creates a sketch holding at most `k` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`] if `k < 2`.
    pub fn new(k: u32) -> Result<Self, Error> {
        Self::with_resize_factor(k, ResizeFactor::default())
    }

    /// Creates a sketch with an explicit storage growth factor.
    pub fn with_resize_factor(k: u32, rf: ResizeFactor) -> Result<Self, Error> {
        Self::with_options(k, rf, XorShift64::default())
    }

    /// Creates a sketch whose random choices are reproducible from `seed`.
    pub fn with_seed(k: u32, seed: u64) -> Result<Self, Error> {
        Self::with_options(k, ResizeFactor::default(), XorShift64::seeded(seed))
    }

    fn with_options(k: u32, rf: ResizeFactor, rng: XorShift64) -> Result<Self, Error> {
        if k < MIN_K {
            return Err(
                Error::new(ErrorKind::InvalidArgument, "k must be at least 2")
                    .with_context("k", k),
            );
        }
        Ok(Self::new_validated(k, rf, rng))
    }

    /// Constructs a sketch from already-validated parameters.
    pub(super) fn new_validated(k: u32, rf: ResizeFactor, rng: XorShift64) -> Self {
        let alloc = initial_alloc(k, rf);
        ReservoirSketch {
            k,
            n: 0,
            rf,
            curr_items_alloc: alloc,
            data: Vec::with_capacity(alloc),
            rng,
        }
    }

    /// Reassembles a sketch from decoded envelope fields.
    pub(super) fn from_parts(k: u32, rf: ResizeFactor, n: u64, data: Vec<T>) -> Self {
        let mut alloc = initial_alloc(k, rf);
        while alloc < data.len() {
            alloc = grown_alloc(k, rf, alloc);
        }
        ReservoirSketch {
            k,
            n,
            rf,
            curr_items_alloc: alloc,
            data,
            rng: XorShift64::default(),
        }
    }

    /// Presents an item to the sketch.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityExceeded`] once the stream length would
    /// exceed 2^48 - 1 items.
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        if self.n >= MAX_ITEMS_SEEN {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                "reservoir stream length limit reached",
            )
            .with_context("max_items_seen", MAX_ITEMS_SEEN));
        }

        if self.n < self.k as u64 {
            // exact mode: still filling the reservoir
            if self.data.len() == self.curr_items_alloc
                && self.curr_items_alloc < self.k as usize
            {
                self.curr_items_alloc = grown_alloc(self.k, self.rf, self.curr_items_alloc);
                self.data.reserve(self.curr_items_alloc - self.data.len());
            }
            self.data.push(item);
            self.n += 1;
        } else {
            self.n += 1;
            // overwrite slot j with probability k / n
            let j = self.rng.next_u64_below(self.n);
            if j < self.k as u64 {
                self.data[j as usize] = item;
            }
        }
        Ok(())
    }

    /// Maximum number of samples retained.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Total number of items presented to the sketch.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Number of samples currently held, `min(n, k)`.
    pub fn num_samples(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no items have been presented.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Weight each retained sample stands for: 1 in exact mode, `n / k`
    /// once sampling.
    pub fn implicit_sample_weight(&self) -> f64 {
        if self.n < self.k as u64 {
            1.0
        } else {
            self.n as f64 / self.k as f64
        }
    }

    /// Estimates the total stream count of items matching `predicate`.
    ///
    /// In exact mode the answer is exact; in sampling mode the bounds are
    /// two-sided at roughly two standard deviations, tightened by the
    /// sampling rate.
    pub fn estimate_subset_sum<F>(&self, predicate: F) -> SubsetSumEstimate
    where
        F: Fn(&T) -> bool,
    {
        if self.n == 0 {
            return SubsetSumEstimate::default();
        }

        let num_samples = self.data.len() as u64;
        let true_count = self.data.iter().filter(|item| predicate(item)).count() as u64;

        if self.n <= self.k as u64 {
            return SubsetSumEstimate {
                lower: true_count as f64,
                estimate: true_count as f64,
                upper: true_count as f64,
                total_weight: num_samples as f64,
            };
        }

        let sampling_rate = num_samples as f64 / self.n as f64;
        let estimate = true_count as f64 * self.n as f64 / num_samples as f64;
        let lb = bounds::pseudo_hypergeometric_lb_on_p(num_samples, true_count, sampling_rate);
        let ub = bounds::pseudo_hypergeometric_ub_on_p(num_samples, true_count, sampling_rate);
        SubsetSumEstimate {
            lower: self.n as f64 * lb,
            estimate,
            upper: self.n as f64 * ub,
            total_weight: self.n as f64,
        }
    }
}

impl<T: Clone> ReservoirSketch<T> {
    /// Returns a copy of the retained samples.
    ///
    /// The order is storage order and carries no rank meaning.
    pub fn samples(&self) -> Vec<T> {
        self.data.clone()
    }

    /// Returns a copy of this sketch shrunk to capacity `max_k`.
    ///
    /// The copy observes the retained samples as a fresh stream and then
    /// adopts the original stream length, so its implicit sample weight
    /// matches the original's.
    pub fn downsampled_copy(&self, max_k: u32) -> Result<Self, Error> {
        let mut copy = Self::with_resize_factor(max_k, self.rf)?;
        for item in &self.data {
            copy.update(item.clone())?;
        }
        if self.n > copy.n {
            copy.force_increment_items_seen(self.n - copy.n)?;
        }
        Ok(copy)
    }
}

// Internal access for the union's weighted merge.
impl<T> ReservoirSketch<T> {
    pub(super) fn items(&self) -> &[T] {
        &self.data
    }

    pub(super) fn insert_value_at_position(&mut self, value: T, pos: usize) {
        self.data[pos] = value;
    }

    /// Advances `n` without touching the samples.
    pub(super) fn force_increment_items_seen(&mut self, amount: u64) -> Result<(), Error> {
        let new_n = self.n.checked_add(amount).unwrap_or(u64::MAX);
        if new_n > MAX_ITEMS_SEEN {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                "reservoir stream length limit reached",
            )
            .with_context("max_items_seen", MAX_ITEMS_SEEN));
        }
        self.n = new_n;
        Ok(())
    }
}

fn initial_alloc(k: u32, rf: ResizeFactor) -> usize {
    let ceil_lg_k = resize::ceil_lg(k as u64);
    let lg = resize::starting_sub_multiple(ceil_lg_k, rf.lg(), resize::MIN_LG_ARR_ITEMS);
    resize::adjusted_size(k as usize, 1 << lg)
}

fn grown_alloc(k: u32, rf: ResizeFactor, alloc: usize) -> usize {
    if rf.lg() == 0 {
        k as usize
    } else {
        resize::adjusted_size(k as usize, alloc << rf.lg())
    }
}
