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
use crate::sampling::SubsetSumEstimate;

/// Minimum sample capacity.
pub(super) const MIN_K: u32 = 8;
/// Maximum sample capacity representable in the envelope.
pub(super) const MAX_K: u32 = i32::MAX as u32 - 1;

/// Weight slot value tagging a reservoir-region member.
const R_WEIGHT_SENTINEL: f64 = -1.0;

/// Variance-optimal weighted sample of at most `k` items.
///
/// The sketch keeps one backing array split into a heavy region `H` of
/// items retained with their exact weights (a min-heap keyed by weight)
/// and a reservoir region `R` of items sharing the implicit weight
/// `tau = total_weight_r / r`. Items heavier than `tau` stay in `H`;
/// lighter items compete for the `R` slots, which is what minimizes the
/// variance of subset-sum estimates.
///
/// # Usage
///
/// ```rust
/// use streamsketches::sampling::VarOptSketch;
///
/// let mut sketch = VarOptSketch::new(8).unwrap();
/// for i in 1..=7_u64 {
///     sketch.update(i, 1.0).unwrap();
/// }
/// sketch.update(8, 1000.0).unwrap();
///
/// let total: f64 = sketch.all().map(|(_, weight)| weight).sum();
/// assert!((total - 1007.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct VarOptSketch<T> {
    pub(super) k: u32,
    pub(super) n: u64,
    pub(super) h: usize,
    pub(super) m: usize,
    pub(super) r: usize,
    pub(super) total_wt_r: f64,
    pub(super) rf: ResizeFactor,
    curr_items_alloc: usize,
    pub(super) data: Vec<Option<T>>,
    pub(super) weights: Vec<f64>,
    /// Per-H-item flags, present only on the gadget variant.
    pub(super) marks: Option<Vec<bool>>,
    rng: XorShift64,
}

impl<T> VarOptSketch<T> {
    /// Creates a sketch holding at most `k` weighted samples.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`] if `k` is outside
    /// `[8, 2^31 - 2]`.
    pub fn new(k: u32) -> Result<Self, Error> {
        Self::with_options(k, ResizeFactor::default(), XorShift64::default())
    }

    /// Creates a sketch whose random choices are reproducible from `seed`.
    pub fn with_seed(k: u32, seed: u64) -> Result<Self, Error> {
        Self::with_options(k, ResizeFactor::default(), XorShift64::seeded(seed))
    }

    fn with_options(k: u32, rf: ResizeFactor, rng: XorShift64) -> Result<Self, Error> {
        if !(MIN_K..=MAX_K).contains(&k) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "k must be in [8, 2^31 - 2]",
            )
            .with_context("k", k));
        }
        let mut alloc = initial_alloc(k, rf);
        if alloc == k as usize {
            // room for the gap slot used during updates
            alloc += 1;
        }
        Ok(VarOptSketch {
            k,
            n: 0,
            h: 0,
            m: 0,
            r: 0,
            total_wt_r: 0.0,
            rf,
            curr_items_alloc: alloc,
            data: Vec::with_capacity(alloc),
            weights: Vec::with_capacity(alloc),
            marks: None,
            rng,
        })
    }

    /// Reassembles a sketch from decoded envelope fields.
    pub(super) fn from_parts(
        k: u32,
        rf: ResizeFactor,
        n: u64,
        h: usize,
        r: usize,
        total_wt_r: f64,
        data: Vec<Option<T>>,
        weights: Vec<f64>,
        marks: Option<Vec<bool>>,
    ) -> Self {
        let curr_items_alloc = if r > 0 {
            k as usize + 1
        } else {
            let mut alloc = initial_alloc(k, rf);
            while alloc < data.len() {
                alloc = resize::adjusted_size(k as usize + 1, alloc << rf.lg().max(1));
            }
            alloc
        };
        VarOptSketch {
            k,
            n,
            h,
            m: 0,
            r,
            total_wt_r,
            rf,
            curr_items_alloc,
            data,
            weights,
            marks,
            rng: XorShift64::default(),
        }
    }

    /// Presents an item with the given weight.
    ///
    /// A zero weight is silently ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidInput`] for negative, NaN, or infinite
    /// weights; the sketch is not modified.
    pub fn update(&mut self, item: T, weight: f64) -> Result<(), Error> {
        if weight.is_nan() || weight.is_infinite() || weight < 0.0 {
            return Err(Error::invalid_input("weight must be finite and non-negative")
                .with_context("weight", weight));
        }
        if weight == 0.0 {
            return Ok(());
        }
        self.n += 1;

        if self.r == 0 {
            self.update_warmup_phase(item, weight);
        } else {
            // estimation mode: classify against the implicit R weight
            let hypothetical_tau = (weight + self.total_wt_r) / self.r as f64;
            let is_light = (self.h == 0 || weight <= self.peek_min()) && weight < hypothetical_tau;
            if is_light {
                self.update_light(item, weight);
            } else if self.r == 1 {
                self.update_heavy_r_eq_1(item, weight);
            } else {
                self.update_heavy_general(item, weight);
            }
        }
        Ok(())
    }

    /// Maximum number of samples retained.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Total number of nonzero-weight items presented.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Number of samples currently held.
    pub fn num_samples(&self) -> usize {
        self.h + self.r
    }

    /// Returns true if no items have been retained.
    pub fn is_empty(&self) -> bool {
        self.h == 0 && self.r == 0
    }

    /// Restores the sketch to its freshly constructed state.
    pub fn reset(&mut self) {
        let had_marks = self.marks.is_some();
        let mut alloc = initial_alloc(self.k, self.rf);
        if alloc == self.k as usize {
            alloc += 1;
        }
        self.n = 0;
        self.h = 0;
        self.m = 0;
        self.r = 0;
        self.total_wt_r = 0.0;
        self.curr_items_alloc = alloc;
        self.data = Vec::with_capacity(alloc);
        self.weights = Vec::with_capacity(alloc);
        self.marks = if had_marks { Some(Vec::with_capacity(alloc)) } else { None };
    }

    /// Implicit weight shared by every R-region item.
    pub fn tau(&self) -> f64 {
        if self.r > 0 {
            self.total_wt_r / self.r as f64
        } else {
            0.0
        }
    }

    /// Estimates the total stream weight of items matching `predicate`.
    ///
    /// Matches in the heavy region contribute their exact weights; matches
    /// in the reservoir region contribute a bounded fraction of the
    /// region's total weight.
    pub fn estimate_subset_sum<F>(&self, predicate: F) -> SubsetSumEstimate
    where
        F: Fn(&T) -> bool,
    {
        if self.n == 0 {
            return SubsetSumEstimate::default();
        }

        let mut h_true_weight = 0.0;
        let mut h_total_weight = 0.0;
        for idx in 0..self.h {
            if let Some(item) = &self.data[idx] {
                h_total_weight += self.weights[idx];
                if predicate(item) {
                    h_true_weight += self.weights[idx];
                }
            }
        }

        if self.r == 0 {
            return SubsetSumEstimate {
                lower: h_true_weight,
                estimate: h_true_weight,
                upper: h_true_weight,
                total_weight: h_total_weight,
            };
        }

        let num_sampled = self.n - self.h as u64;
        let effective_sampling_rate = self.r as f64 / num_sampled as f64;
        let mut r_true_count = 0u64;
        for idx in (self.h + 1)..(self.h + 1 + self.r) {
            if let Some(item) = &self.data[idx] {
                if predicate(item) {
                    r_true_count += 1;
                }
            }
        }

        let lb = bounds::pseudo_hypergeometric_lb_on_p(
            self.r as u64,
            r_true_count,
            effective_sampling_rate,
        );
        let ub = bounds::pseudo_hypergeometric_ub_on_p(
            self.r as u64,
            r_true_count,
            effective_sampling_rate,
        );
        let estimated_fraction = r_true_count as f64 / self.r as f64;
        SubsetSumEstimate {
            lower: h_true_weight + self.total_wt_r * lb,
            estimate: h_true_weight + self.total_wt_r * estimated_fraction,
            upper: h_true_weight + self.total_wt_r * ub,
            total_weight: h_total_weight + self.total_wt_r,
        }
    }

    // ========================================================================
    // Update internals
    // ========================================================================

    fn update_warmup_phase(&mut self, item: T, weight: f64) {
        debug_assert_eq!(self.r, 0);
        debug_assert_eq!(self.m, 0);

        if self.h == self.curr_items_alloc {
            self.grow_data_arrays();
        }
        self.data.push(Some(item));
        self.weights.push(weight);
        if let Some(marks) = &mut self.marks {
            marks.push(false);
        }
        self.h += 1;

        if self.h > self.k as usize {
            self.transition_from_warmup();
        }
    }

    fn transition_from_warmup(&mut self) {
        self.convert_to_heap();

        // move the two lightest items into the M region
        self.pop_min_to_m_region();
        self.pop_min_to_m_region();

        // the very lightest becomes the initial R member
        self.m -= 1;
        self.r += 1;
        let k = self.k as usize;
        self.total_wt_r = self.weights[k];
        self.weights[k] = R_WEIGHT_SENTINEL;

        self.grow_candidate_set(self.weights[k - 1] + self.total_wt_r, 2);
    }

    fn update_light(&mut self, item: T, weight: f64) {
        debug_assert!(self.r >= 1);
        debug_assert_eq!(self.h + self.r, self.k as usize);

        // the gap at index h takes the new candidate
        let m_slot = self.h;
        self.data[m_slot] = Some(item);
        self.weights[m_slot] = weight;
        if let Some(marks) = &mut self.marks {
            marks[m_slot] = false;
        }
        self.m += 1;

        self.grow_candidate_set(self.total_wt_r + weight, self.r + 1);
    }

    fn update_heavy_general(&mut self, item: T, weight: f64) {
        debug_assert_eq!(self.m, 0);
        debug_assert!(self.r >= 2);
        debug_assert_eq!(self.h + self.r, self.k as usize);

        self.push(item, weight);
        self.grow_candidate_set(self.total_wt_r, self.r);
    }

    fn update_heavy_r_eq_1(&mut self, item: T, weight: f64) {
        debug_assert_eq!(self.m, 0);
        debug_assert_eq!(self.r, 1);
        debug_assert_eq!(self.h + self.r, self.k as usize);

        self.push(item, weight);
        self.pop_min_to_m_region();

        // any 2 items can be downsampled to 1, so the lightest H item plus
        // the R item form a valid starting candidate set
        let wt_cands = self.weights[self.k as usize - 1] + self.total_wt_r;
        self.grow_candidate_set(wt_cands, 2);
    }

    /// Keeps popping the heap minimum into the candidate set while it is
    /// lighter than the candidates' average weight, then downsamples the
    /// candidates back to one fewer item.
    fn grow_candidate_set(&mut self, mut wt_cands: f64, mut num_cands: usize) {
        debug_assert_eq!(self.h + self.m + self.r, self.k as usize + 1);
        debug_assert!(num_cands >= 2);

        while self.h > 0 {
            let next_wt = self.peek_min();
            let next_tot_wt = wt_cands + next_wt;
            // strict lightness test against the candidate average
            if next_wt * (num_cands as f64) < next_tot_wt {
                wt_cands = next_tot_wt;
                num_cands += 1;
                self.pop_min_to_m_region();
            } else {
                break;
            }
        }
        self.downsample_candidate_set(wt_cands, num_cands);
    }

    fn downsample_candidate_set(&mut self, wt_cands: f64, num_cands: usize) {
        if num_cands < 2 {
            return;
        }
        debug_assert_eq!(self.h + num_cands, self.k as usize + 1);

        let delete_slot = self.choose_delete_slot(wt_cands, num_cands);
        let leftmost_cand_slot = self.h;
        debug_assert!(delete_slot >= leftmost_cand_slot);
        debug_assert!(delete_slot <= self.k as usize);

        // re-tag the M items as R members
        for slot in leftmost_cand_slot..leftmost_cand_slot + self.m {
            self.weights[slot] = R_WEIGHT_SENTINEL;
        }

        // works even when delete_slot == leftmost_cand_slot
        let moved = self.data[leftmost_cand_slot].take();
        self.data[delete_slot] = moved;
        if let Some(marks) = &mut self.marks {
            marks[delete_slot] = marks[leftmost_cand_slot];
        }

        self.m = 0;
        self.r = num_cands - 1;
        self.total_wt_r = wt_cands;
    }

    fn choose_delete_slot(&mut self, wt_cands: f64, num_cands: usize) -> usize {
        debug_assert!(self.r > 0);
        if self.m == 0 {
            // a really heavy new item displaced no M candidates
            self.pick_random_slot_in_r()
        } else if self.m == 1 {
            // keep the single M item with probability (num_cands - 1) * w_m / wt_cands
            let wt_m_cand = self.weights[self.h];
            if wt_cands * self.rng.next_f64_excluding_zero()
                < (num_cands - 1) as f64 * wt_m_cand
            {
                self.pick_random_slot_in_r()
            } else {
                self.h
            }
        } else {
            let delete_slot = self.choose_weighted_delete_slot(wt_cands, num_cands);
            let first_r_slot = self.h + self.m;
            if delete_slot == first_r_slot {
                self.pick_random_slot_in_r()
            } else {
                delete_slot
            }
        }
    }

    fn choose_weighted_delete_slot(&mut self, wt_cands: f64, num_cands: usize) -> usize {
        debug_assert!(self.m >= 1);
        let offset = self.h;
        let final_m = offset + self.m - 1;

        let mut left_subtotal = 0.0;
        let mut right_subtotal = -wt_cands * self.rng.next_f64_excluding_zero();
        for slot in offset..=final_m {
            left_subtotal += (num_cands - 1) as f64 * self.weights[slot];
            right_subtotal += wt_cands;
            if left_subtotal < right_subtotal {
                return slot;
            }
        }
        // signals deletion out of R
        final_m + 1
    }

    fn pick_random_slot_in_r(&mut self) -> usize {
        debug_assert!(self.r > 0);
        let offset = self.h + self.m;
        offset + self.rng.next_u64_below(self.r as u64) as usize
    }

    // ========================================================================
    // Heap maintenance over the H region
    // ========================================================================

    fn peek_min(&self) -> f64 {
        debug_assert!(self.h > 0);
        self.weights[0]
    }

    /// Bottom-up heapify of the H region by weight ascending.
    fn convert_to_heap(&mut self) {
        if self.h < 2 {
            return;
        }
        let last_slot = self.h - 1;
        let last_non_leaf = (last_slot + 1) / 2 - 1;
        for slot in (0..=last_non_leaf).rev() {
            self.restore_towards_leaves(slot);
        }
    }

    fn restore_towards_leaves(&mut self, slot_in: usize) {
        debug_assert!(self.h > 0);
        let last_slot = self.h - 1;
        let mut slot = slot_in;
        let mut child = 2 * slot + 1;
        while child <= last_slot {
            let child2 = child + 1;
            if child2 <= last_slot && self.weights[child2] < self.weights[child] {
                child = child2;
            }
            if self.weights[slot] > self.weights[child] {
                self.swap(slot, child);
                slot = child;
                child = 2 * slot + 1;
            } else {
                break;
            }
        }
    }

    fn restore_towards_root(&mut self, slot_in: usize) {
        let mut slot = slot_in;
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.weights[slot] < self.weights[parent] {
                self.swap(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    /// Heap-inserts an item into H through the gap at index `h`.
    fn push(&mut self, item: T, weight: f64) {
        let slot = self.h;
        self.data[slot] = Some(item);
        self.weights[slot] = weight;
        if let Some(marks) = &mut self.marks {
            marks[slot] = false;
        }
        self.h += 1;
        self.restore_towards_root(slot);
    }

    /// Moves the heap minimum into the M region at slot `h - 1`.
    fn pop_min_to_m_region(&mut self) {
        debug_assert!(self.h > 0);
        debug_assert_eq!(self.h + self.m + self.r, self.k as usize + 1);

        if self.h == 1 {
            // the lone H item is already in place, just relabel it
            self.h -= 1;
            self.m += 1;
        } else {
            let tgt = self.h - 1;
            self.swap(0, tgt);
            self.h -= 1;
            self.m += 1;
            self.restore_towards_leaves(0);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.data.swap(a, b);
        self.weights.swap(a, b);
        if let Some(marks) = &mut self.marks {
            marks.swap(a, b);
        }
    }

    fn grow_data_arrays(&mut self) {
        let target = self.k as usize + 1;
        self.curr_items_alloc =
            resize::adjusted_size(target, self.curr_items_alloc << self.rf.lg().max(1));
        self.data.reserve(self.curr_items_alloc - self.data.len());
        self.weights.reserve(self.curr_items_alloc - self.weights.len());
        if let Some(marks) = &mut self.marks {
            let additional = self.curr_items_alloc - marks.len();
            marks.reserve(additional);
        }
    }
}

impl<T: Clone> VarOptSketch<T> {
    /// Iterates over the retained samples as `(item, weight)` pairs.
    ///
    /// H-region items carry their exact weights, followed by R-region items
    /// each reported at the implicit weight `tau`. The sum of the reported
    /// weights equals the sum of all inserted weights up to floating-point
    /// round-off.
    pub fn all(&self) -> VarOptSamples<'_, T> {
        VarOptSamples {
            sketch: self,
            slot: 0,
        }
    }
}

/// Iterator over the samples of a [`VarOptSketch`].
///
/// Yields items by value so the sketch may be mutated between iterations.
#[derive(Debug)]
pub struct VarOptSamples<'a, T> {
    sketch: &'a VarOptSketch<T>,
    slot: usize,
}

impl<T: Clone> Iterator for VarOptSamples<'_, T> {
    type Item = (T, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let sketch = self.sketch;
        // skip the gap slot between the H and R regions
        if self.slot == sketch.h && sketch.r > 0 {
            self.slot += 1;
        }
        let end = sketch.h + if sketch.r > 0 { 1 + sketch.r } else { 0 };
        if self.slot >= end {
            return None;
        }
        let slot = self.slot;
        self.slot += 1;
        let item = sketch.data[slot].clone()?;
        let weight = if slot < sketch.h {
            sketch.weights[slot]
        } else {
            sketch.tau()
        };
        Some((item, weight))
    }
}

fn initial_alloc(k: u32, rf: ResizeFactor) -> usize {
    let ceil_lg_k = resize::ceil_lg(k as u64);
    let lg = resize::starting_sub_multiple(ceil_lg_k, rf.lg(), resize::MIN_LG_ARR_ITEMS);
    resize::adjusted_size(k as usize, 1 << lg)
}
