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

//! A library of streaming probabilistic sketches: compact, bounded-memory
//! summaries of large or unbounded data streams.
//!
//! The crate bundles four mutually independent sketches sharing a common
//! little-endian binary envelope convention:
//!
//! - [`bloom`]: a Bloom filter for approximate set membership with
//!   double hashing, set algebra, and a cross-language byte format.
//! - [`sampling`]: uniform reservoir sampling with a merging union
//!   operator, and variance-optimal (VarOpt) weighted sampling.
//! - [`tdigest`]: a mergeable rank/quantile sketch built from weighted
//!   centroids.
//!
//! Sketches are not safe for concurrent mutation of a single instance;
//! distinct instances are fully independent. Serialization operates on
//! in-memory byte buffers and is bit-compatible with the Apache
//! DataSketches Java and C++ implementations of the same formats.

pub mod bloom;
pub mod error;
pub mod sampling;
pub mod tdigest;

pub(crate) mod codec;
pub(crate) mod common;
pub(crate) mod hash;
