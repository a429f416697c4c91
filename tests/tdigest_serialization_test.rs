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
use streamsketches::tdigest::TDigest;

#[test]
fn test_empty_round_trip() {
    let mut tdigest = TDigest::new(150).unwrap();
    let bytes = tdigest.serialize();
    assert_eq!(bytes.len(), 8);

    let mut restored = TDigest::deserialize(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.k(), 150);
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_single_value_round_trip() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(-3.25).unwrap();
    let bytes = tdigest.serialize();
    assert_eq!(bytes.len(), 16);

    let mut restored = TDigest::deserialize(&bytes).unwrap();
    assert_eq!(restored.total_weight(), 1);
    assert_eq!(restored.min_value().unwrap(), -3.25);
    assert_eq!(restored.max_value().unwrap(), -3.25);
    assert_eq!(restored.serialize(), bytes);
}

#[test]
fn test_many_values_round_trip_is_bit_identical() {
    let mut tdigest = TDigest::new(100).unwrap();
    for i in 0..10_000 {
        tdigest.update(i as f64).unwrap();
    }

    // serialize compresses, so a round-tripped sketch re-serializes equal
    let bytes = tdigest.serialize();
    let mut restored = TDigest::deserialize(&bytes).unwrap();
    assert_eq!(restored.serialize(), bytes);

    assert_eq!(restored.total_weight(), 10_000);
    assert_eq!(restored.min_value().unwrap(), 0.0);
    assert_eq!(restored.max_value().unwrap(), 9_999.0);

    let median = restored.quantile(0.5).unwrap();
    assert!((median - 5_000.0).abs() < 500.0);
}

#[test]
fn test_reverse_merge_flag_survives_round_trip() {
    let mut tdigest = TDigest::new(50).unwrap();
    for i in 0..10_000 {
        tdigest.update(i as f64).unwrap();
    }
    let bytes = tdigest.serialize();
    let mut restored = TDigest::deserialize(&bytes).unwrap();

    // continuing to update both sketches keeps them in sync because the
    // merge direction flag was preserved
    for i in 0..10_000 {
        tdigest.update(i as f64).unwrap();
        restored.update(i as f64).unwrap();
    }
    assert_eq!(tdigest.serialize(), restored.serialize());
}

#[test]
fn test_wrong_family_is_rejected() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(1.0).unwrap();
    let mut bytes = tdigest.serialize();
    bytes[2] = 11;

    let err = TDigest::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));
}

#[test]
fn test_truncated_centroid_section_is_rejected() {
    let mut tdigest = TDigest::new(100).unwrap();
    for i in 0..5_000 {
        tdigest.update(i as f64).unwrap();
    }
    let bytes = tdigest.serialize();
    assert!(TDigest::deserialize(&bytes[..bytes.len() - 4]).is_err());
    assert!(TDigest::deserialize(&bytes[..20]).is_err());
}
