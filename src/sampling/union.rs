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

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;
use crate::common::resize::ResizeFactor;
use crate::error::Error;
use crate::sampling::ReservoirSketch;

/// Union operator merging reservoir sketches while preserving uniformity.
///
/// The union accumulates into an internal gadget sketch. An incoming
/// sketch in exact mode is replayed item by item; two sketches both in
/// sampling mode are combined by a weighted merge that keeps per-item
/// inclusion probabilities uniform. An input in sampling mode with a
/// capacity below `max_k` forces the result down to that smaller
/// capacity, which is preserved by `result()`.
///
/// # Usage
///
/// ```rust
/// use streamsketches::sampling::ReservoirSketch;
/// use streamsketches::sampling::ReservoirUnion;
///
/// let mut s1 = ReservoirSketch::new(10).unwrap();
/// let mut s2 = ReservoirSketch::new(10).unwrap();
/// for i in 1..=500_u64 {
///     s1.update(i).unwrap();
///     s2.update(i + 500).unwrap();
/// }
///
/// let mut union = ReservoirUnion::new(10).unwrap();
/// union.update_sketch(&s1).unwrap();
/// union.update_sketch(&s2).unwrap();
///
/// let result = union.result();
/// assert_eq!(result.n(), 1000);
/// assert_eq!(result.num_samples(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct ReservoirUnion<T> {
    pub(super) max_k: u32,
    pub(super) gadget: Option<ReservoirSketch<T>>,
    rng: XorShift64,
}

impl<T: Clone> ReservoirUnion<T> {
    /// Creates a union producing a sample of at most `max_k` items.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// if `max_k < 2`.
    pub fn new(max_k: u32) -> Result<Self, Error> {
        Self::with_rng(max_k, XorShift64::default())
    }

    /// Creates a union whose random choices are reproducible from `seed`.
    pub fn with_seed(max_k: u32, seed: u64) -> Result<Self, Error> {
        Self::with_rng(max_k, XorShift64::seeded(seed))
    }

    fn with_rng(max_k: u32, rng: XorShift64) -> Result<Self, Error> {
        if max_k < super::reservoir::MIN_K {
            return Err(Error::invalid_argument("max_k must be at least 2")
                .with_context("max_k", max_k));
        }
        Ok(ReservoirUnion {
            max_k,
            gadget: None,
            rng,
        })
    }

    pub(super) fn from_parts(max_k: u32, gadget: Option<ReservoirSketch<T>>) -> Self {
        ReservoirUnion {
            max_k,
            gadget,
            rng: XorShift64::default(),
        }
    }

    /// Target capacity of the union result.
    pub fn max_k(&self) -> u32 {
        self.max_k
    }

    /// Returns true if the union has absorbed no items.
    pub fn is_empty(&self) -> bool {
        self.gadget.as_ref().is_none_or(|g| g.is_empty())
    }

    /// Presents a single item to the union.
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        if self.gadget.is_none() {
            self.gadget = Some(ReservoirSketch::new_validated(
                self.max_k,
                ResizeFactor::default(),
                XorShift64::seeded(self.rng.next_u64()),
            ));
        }
        match &mut self.gadget {
            Some(gadget) => gadget.update(item),
            None => Ok(()),
        }
    }

    /// Merges a sketch into the union.
    ///
    /// Empty sketches are ignored. A sketch with capacity above `max_k` is
    /// first shrunk to `max_k` via a downsampled copy.
    pub fn update_sketch(&mut self, sketch_in: &ReservoirSketch<T>) -> Result<(), Error> {
        if sketch_in.is_empty() {
            return Ok(());
        }

        let downsampled;
        let source = if sketch_in.k() > self.max_k {
            downsampled = sketch_in.downsampled_copy(self.max_k)?;
            &downsampled
        } else {
            sketch_in
        };

        let merged = match self.gadget.take() {
            Some(gadget) if !gadget.is_empty() => self.two_way_merge(gadget, source)?,
            _ => self.create_new_gadget(source)?,
        };
        self.gadget = Some(merged);
        Ok(())
    }

    /// Returns a copy of the current union state as a sketch.
    ///
    /// With no input seen yet, the result is an empty sketch of capacity
    /// `max_k`. Otherwise the result's capacity may be below `max_k` when a
    /// sampling-mode input with a smaller capacity was adopted.
    pub fn result(&self) -> ReservoirSketch<T> {
        match &self.gadget {
            Some(gadget) => gadget.clone(),
            None => ReservoirSketch::new_validated(
                self.max_k,
                ResizeFactor::default(),
                XorShift64::default(),
            ),
        }
    }

    /// Chooses the first gadget for an incoming sketch.
    ///
    /// An exact-mode input with a smaller capacity is upgraded into a fresh
    /// gadget at `max_k`; anything else is adopted as-is, keeping its own
    /// capacity.
    fn create_new_gadget(
        &mut self,
        source: &ReservoirSketch<T>,
    ) -> Result<ReservoirSketch<T>, Error> {
        if source.k() < self.max_k && source.n() <= source.k() as u64 {
            let fresh = ReservoirSketch::new_validated(
                self.max_k,
                ResizeFactor::default(),
                XorShift64::seeded(self.rng.next_u64()),
            );
            self.two_way_merge(fresh, source)
        } else {
            Ok(source.clone())
        }
    }

    /// Merges `source` with the current gadget, returning the new gadget.
    fn two_way_merge(
        &mut self,
        mut gadget: ReservoirSketch<T>,
        source: &ReservoirSketch<T>,
    ) -> Result<ReservoirSketch<T>, Error> {
        if source.n() <= source.k() as u64 {
            // source is exact: replay its samples
            standard_merge(&mut gadget, source)?;
            Ok(gadget)
        } else if gadget.n() < gadget.k() as u64 {
            // gadget is exact but source is sampling: swap roles
            let mut swapped = source.clone();
            standard_merge(&mut swapped, &gadget)?;
            Ok(swapped)
        } else if source.implicit_sample_weight()
            < gadget.n() as f64 / (gadget.k() - 1) as f64
        {
            // both sampling: merge the lighter side into the heavier
            self.weighted_merge(&mut gadget, source)?;
            Ok(gadget)
        } else {
            let mut swapped = source.clone();
            self.weighted_merge(&mut swapped, &gadget)?;
            Ok(swapped)
        }
    }

    /// Folds a sampling-mode `source` into a sampling-mode `target` whose
    /// per-item weight is at least as heavy.
    fn weighted_merge(
        &mut self,
        target: &mut ReservoirSketch<T>,
        source: &ReservoirSketch<T>,
    ) -> Result<(), Error> {
        let source_item_weight = source.n() as f64 / source.k() as f64;
        let rescaled_prob = target.k() as f64 * source_item_weight;
        let mut target_total = target.n() as f64;
        let target_k = target.k() as u64;

        for item in source.items() {
            // fractional stream position of the incoming item
            target_total += source_item_weight;
            if target_total * self.rng.next_f64() < rescaled_prob {
                let pos = self.rng.next_u64_below(target_k) as usize;
                target.insert_value_at_position(item.clone(), pos);
            }
        }
        target.force_increment_items_seen(source.n())
    }
}

fn standard_merge<T: Clone>(
    target: &mut ReservoirSketch<T>,
    source: &ReservoirSketch<T>,
) -> Result<(), Error> {
    for item in source.items() {
        target.update(item.clone())?;
    }
    Ok(())
}
