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

//! Hash functions backing the Bloom filter.

mod xxhash;

pub(crate) use xxhash::XxHash64;

/// Default hash seed shared with the cross-language Bloom filter format.
pub(crate) const DEFAULT_UPDATE_SEED: u64 = 9001;

pub(crate) fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// One-shot XxHash64 over a byte slice.
pub(crate) fn xxhash64(bytes: &[u8], seed: u64) -> u64 {
    use std::hash::Hasher;
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(bytes);
    hasher.finish64()
}
