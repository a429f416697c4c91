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

//! Bloom filter for probabilistic set membership testing.
//!
//! The filter hashes each item to `k` bit positions with XxHash64-based
//! double hashing and answers membership queries with no false negatives
//! and a tunable false positive rate. Filters built with the same seed,
//! hash count, and capacity support union, intersection, and inversion.
//!
//! The serialized form is bit-compatible with the Apache DataSketches
//! Java and C++ Bloom filters.
//!
//! # Usage
//!
//! ```rust
//! use streamsketches::bloom::BloomFilterBuilder;
//!
//! let mut filter = BloomFilterBuilder::with_accuracy(1000, 0.01)
//!     .build()
//!     .unwrap();
//! filter.update(&42_u64);
//! filter.update(&"apple");
//!
//! assert!(filter.query(&42_u64));
//! assert!(filter.query(&"apple"));
//! assert!(!filter.query(&"grape"));
//! ```

mod input;
mod serialization;
mod sketch;

pub use self::input::BloomHashable;
pub use self::sketch::BloomFilter;
pub use self::sketch::BloomFilterBuilder;
