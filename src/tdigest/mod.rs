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

//! T-Digest sketch for estimating quantiles and ranks.
//!
//! The sketch buffers raw observations and periodically merges them into a
//! bounded list of weighted centroids using the `k_2` scale function, which
//! concentrates resolution at the distribution tails. Merging alternates
//! direction between compressions to avoid systematic bias.
//!
//! The serialized form is bit-compatible with the Apache DataSketches
//! `tdigest_double`; a read-only compatibility path also accepts the
//! big-endian format of the original t-Digest reference implementation.
//!
//! # Usage
//!
//! ```rust
//! use streamsketches::tdigest::TDigest;
//!
//! let mut sketch = TDigest::new(100).unwrap();
//! for i in 1..=10_000 {
//!     sketch.update(i as f64).unwrap();
//! }
//!
//! let median = sketch.quantile(0.5).unwrap();
//! assert!(median > 4_500.0 && median < 5_500.0);
//! ```

mod serialization;
mod sketch;

pub use self::sketch::TDigest;

/// Default value of the compression parameter k.
pub const DEFAULT_K: u16 = 200;
