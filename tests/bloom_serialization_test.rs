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

use googletest::assert_that;
use googletest::prelude::contains_substring;
use streamsketches::bloom::BloomFilter;
use streamsketches::bloom::BloomFilterBuilder;

#[test]
fn test_empty_round_trip_is_24_bytes() {
    let filter = BloomFilterBuilder::with_accuracy(1000, 0.01).seed(5).build().unwrap();
    let bytes = filter.serialize();
    assert_eq!(bytes.len(), 24);

    let restored = BloomFilter::deserialize(&bytes).unwrap();
    assert_eq!(restored, filter);
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_round_trip_preserves_configuration_and_bits() {
    let mut filter = BloomFilterBuilder::with_size(1 << 12, 5).seed(31).build().unwrap();
    for i in 0..1000_u64 {
        filter.update(&i);
    }

    let bytes = filter.serialize();
    assert_eq!(bytes.len(), 32 + 8 * ((1 << 12) / 64));
    let restored = BloomFilter::deserialize(&bytes).unwrap();

    assert_eq!(restored.seed(), filter.seed());
    assert_eq!(restored.num_hashes(), filter.num_hashes());
    assert_eq!(restored.capacity(), filter.capacity());
    assert_eq!(restored.bits_used(), filter.bits_used());
    assert_eq!(restored, filter);

    for i in 0..1000_u64 {
        assert!(restored.query(&i));
    }

    // a second serialization is byte-identical
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_deserialized_filter_is_mergeable_with_original() {
    let mut filter = BloomFilterBuilder::with_size(2048, 3).build().unwrap();
    filter.update(&"a");
    let mut restored = BloomFilter::deserialize(&filter.serialize()).unwrap();
    restored.update(&"b");

    filter.union(&restored).unwrap();
    assert!(filter.query(&"a"));
    assert!(filter.query(&"b"));
}

#[test]
fn test_wrong_family_error_message() {
    let filter = BloomFilterBuilder::with_size(256, 3).build().unwrap();
    let mut bytes = filter.serialize();
    bytes[2] = 15;

    let err = BloomFilter::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));
}

#[test]
fn test_unsupported_serial_version() {
    let filter = BloomFilterBuilder::with_size(256, 3).build().unwrap();
    let mut bytes = filter.serialize();
    bytes[1] = 7;

    let err = BloomFilter::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("unsupported serial version"));
}

#[test]
fn test_truncated_buffer_is_rejected() {
    let mut filter = BloomFilterBuilder::with_size(512, 3).build().unwrap();
    for i in 0..32_u64 {
        filter.update(&i);
    }
    let bytes = filter.serialize();
    for cut in [0, 4, 23, 31, bytes.len() - 8] {
        assert!(
            BloomFilter::deserialize(&bytes[..cut]).is_err(),
            "accepted a buffer cut to {cut} bytes"
        );
    }
}
