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

//! Random sampling sketches over streams of generic items.
//!
//! [`ReservoirSketch`] maintains a uniform random sample of at most `k`
//! items from a stream of unknown length; [`ReservoirUnion`] merges
//! reservoirs while preserving uniformity. [`VarOptSketch`] maintains a
//! variance-optimal weighted sample under arbitrary positive weights.
//!
//! All sampling sketches draw from an internal pseudo-random generator.
//! Results are distributionally correct but not reproducible unless a
//! seed is supplied at construction.
//!
//! # Usage
//!
//! ```rust
//! use streamsketches::sampling::ReservoirSketch;
//!
//! let mut sketch = ReservoirSketch::<u64>::new(100).unwrap();
//! for value in 0..10_000 {
//!     sketch.update(value).unwrap();
//! }
//!
//! assert_eq!(sketch.num_samples(), 100);
//! assert_eq!(sketch.n(), 10_000);
//! ```

mod reservoir;
mod serialization;
mod union;
mod varopt;

pub mod serde;

pub use serde::F64Serde;
pub use serde::I64Serde;
pub use serde::ItemsSerde;
pub use serde::StringSerde;
pub use serde::U64Serde;

pub use self::reservoir::ReservoirSketch;
pub use self::union::ReservoirUnion;
pub use self::varopt::VarOptSamples;
pub use self::varopt::VarOptSketch;

pub use crate::common::resize::ResizeFactor;

/// Largest stream length a reservoir sketch can represent.
pub const MAX_ITEMS_SEEN: u64 = (1 << 48) - 1;

/// Bounds on a subset sum estimated from a random sample.
///
/// `lower` and `upper` are two-sided bounds at roughly two standard
/// deviations; `total_weight` is the weight the whole sketch represents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubsetSumEstimate {
    /// Lower confidence bound on the subset sum.
    pub lower: f64,
    /// Point estimate of the subset sum.
    pub estimate: f64,
    /// Upper confidence bound on the subset sum.
    pub upper: f64,
    /// Total weight represented by the sketch.
    pub total_weight: f64,
}
