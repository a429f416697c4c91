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

use streamsketches::error::ErrorKind;
use streamsketches::tdigest::TDigest;

#[test]
fn test_empty() {
    let mut tdigest = TDigest::new(10).unwrap();
    assert!(tdigest.is_empty());
    assert_eq!(tdigest.k(), 10);
    assert_eq!(tdigest.total_weight(), 0);
    assert_eq!(tdigest.min_value().unwrap_err().kind(), ErrorKind::EmptySketch);
    assert_eq!(tdigest.max_value().unwrap_err().kind(), ErrorKind::EmptySketch);
    assert_eq!(tdigest.rank(0.0).unwrap_err().kind(), ErrorKind::EmptySketch);
    assert_eq!(tdigest.quantile(0.5).unwrap_err().kind(), ErrorKind::EmptySketch);
    assert_eq!(tdigest.cdf(&[0.0]).unwrap_err().kind(), ErrorKind::EmptySketch);
    assert_eq!(tdigest.pmf(&[0.0]).unwrap_err().kind(), ErrorKind::EmptySketch);
}

#[test]
fn test_rank_out_of_domain() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(1.0).unwrap();
    assert_eq!(tdigest.quantile(-0.1).unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(tdigest.quantile(1.1).unwrap_err().kind(), ErrorKind::InvalidInput);
    assert_eq!(tdigest.rank(f64::NAN).unwrap_err().kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_one_value() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(1.0).unwrap();
    assert_eq!(tdigest.k(), 100);
    assert_eq!(tdigest.total_weight(), 1);
    assert_eq!(tdigest.min_value().unwrap(), 1.0);
    assert_eq!(tdigest.max_value().unwrap(), 1.0);
    assert_eq!(tdigest.rank(0.99).unwrap(), 0.0);
    assert_eq!(tdigest.rank(1.0).unwrap(), 0.5);
    assert_eq!(tdigest.rank(1.01).unwrap(), 1.0);
    assert_eq!(tdigest.quantile(0.0).unwrap(), 1.0);
    assert_eq!(tdigest.quantile(0.5).unwrap(), 1.0);
    assert_eq!(tdigest.quantile(1.0).unwrap(), 1.0);
}

#[test]
fn test_rank_two_values() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(1.0).unwrap();
    tdigest.update(2.0).unwrap();
    assert_eq!(tdigest.rank(0.99).unwrap(), 0.0);
    assert_eq!(tdigest.rank(1.0).unwrap(), 0.25);
    assert_eq!(tdigest.rank(1.25).unwrap(), 0.375);
    assert_eq!(tdigest.rank(1.5).unwrap(), 0.5);
    assert_eq!(tdigest.rank(1.75).unwrap(), 0.625);
    assert_eq!(tdigest.rank(2.0).unwrap(), 0.75);
    assert_eq!(tdigest.rank(2.01).unwrap(), 1.0);
}

#[test]
fn test_rank_repeated_value() {
    let mut tdigest = TDigest::new(100).unwrap();
    for _ in 0..4 {
        tdigest.update(1.0).unwrap();
    }
    assert_eq!(tdigest.rank(0.99).unwrap(), 0.0);
    assert_eq!(tdigest.rank(1.0).unwrap(), 0.5);
    assert_eq!(tdigest.rank(1.01).unwrap(), 1.0);
}

#[test]
fn test_rank_repeated_blocks() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(1.0).unwrap();
    tdigest.update(2.0).unwrap();
    tdigest.update(2.0).unwrap();
    tdigest.update(3.0).unwrap();
    assert_eq!(tdigest.rank(0.99).unwrap(), 0.0);
    assert_eq!(tdigest.rank(1.0).unwrap(), 0.125);
    assert_eq!(tdigest.rank(2.0).unwrap(), 0.5);
    assert_eq!(tdigest.rank(3.0).unwrap(), 0.875);
    assert_eq!(tdigest.rank(3.01).unwrap(), 1.0);
}

#[test]
fn test_uniform_stream_ranks_and_quantiles() {
    let mut tdigest = TDigest::new(100).unwrap();
    let n = 10_000;
    for i in 1..=n {
        tdigest.update(i as f64).unwrap();
    }

    assert_eq!(tdigest.total_weight(), n);
    assert_eq!(tdigest.min_value().unwrap(), 1.0);
    assert_eq!(tdigest.max_value().unwrap(), 10_000.0);

    let rank = tdigest.rank(5_000.0).unwrap();
    assert!((0.45..=0.55).contains(&rank), "rank(5000) = {rank}");

    let median = tdigest.quantile(0.5).unwrap();
    assert!((4_500.0..=5_500.0).contains(&median), "quantile(0.5) = {median}");

    assert_eq!(tdigest.rank(0.5).unwrap(), 0.0);
    assert_eq!(tdigest.rank(10_001.0).unwrap(), 1.0);
    assert_eq!(tdigest.quantile(0.0).unwrap(), 1.0);
    assert_eq!(tdigest.quantile(1.0).unwrap(), 10_000.0);
}

#[test]
fn test_quantile_of_rank_is_close() {
    let mut tdigest = TDigest::new(200).unwrap();
    let n = 100_000;
    for i in 0..n {
        tdigest.update(i as f64).unwrap();
    }
    for value in [1_000.0, 25_000.0, 50_000.0, 75_000.0, 99_000.0] {
        let rank = tdigest.rank(value).unwrap();
        let round_trip = tdigest.quantile(rank).unwrap();
        assert!(
            (round_trip - value).abs() < n as f64 * 0.01,
            "quantile(rank({value})) = {round_trip}"
        );
    }
}

#[test]
fn test_cdf_and_pmf() {
    let mut tdigest = TDigest::new(100).unwrap();
    let n = 10_000;
    for i in 0..n {
        tdigest.update(i as f64).unwrap();
    }

    let cdf = tdigest.cdf(&[(n / 2) as f64]).unwrap();
    assert_eq!(cdf.len(), 2);
    assert!((cdf[0] - 0.5).abs() < 0.01);
    assert_eq!(cdf[1], 1.0);

    let pmf = tdigest.pmf(&[(n / 2) as f64]).unwrap();
    assert_eq!(pmf.len(), 2);
    assert!((pmf[0] - 0.5).abs() < 0.01);
    assert!((pmf[1] - 0.5).abs() < 0.01);
    assert!((pmf.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn test_split_point_validation() {
    let mut tdigest = TDigest::new(100).unwrap();
    tdigest.update(0.0).unwrap();

    assert_eq!(
        tdigest.cdf(&[1.0, 0.0]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        tdigest.cdf(&[0.0, 0.0]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        tdigest.cdf(&[f64::NAN]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        tdigest.pmf(&[f64::INFINITY]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn test_merge() {
    let mut tdigest1 = TDigest::new(100).unwrap();
    let mut tdigest2 = TDigest::new(100).unwrap();
    let n = 10_000;
    for i in 0..n {
        tdigest1.update(i as f64).unwrap();
        tdigest2.update((n + i) as f64).unwrap();
    }

    tdigest1.merge(&tdigest2);
    assert_eq!(tdigest1.total_weight(), 2 * n);
    assert_eq!(tdigest1.min_value().unwrap(), 0.0);
    assert_eq!(tdigest1.max_value().unwrap(), (2 * n - 1) as f64);

    let median = tdigest1.quantile(0.5).unwrap();
    assert!((median - n as f64).abs() < n as f64 * 0.05, "median {median}");
}

#[test]
fn test_merge_with_empty() {
    let mut tdigest = TDigest::new(100).unwrap();
    for i in 0..100 {
        tdigest.update(i as f64).unwrap();
    }
    let empty = TDigest::new(100).unwrap();
    tdigest.merge(&empty);
    assert_eq!(tdigest.total_weight(), 100);

    let mut receiver = TDigest::new(100).unwrap();
    receiver.merge(&tdigest);
    assert_eq!(receiver.total_weight(), 100);
    assert_eq!(receiver.min_value().unwrap(), 0.0);
    assert_eq!(receiver.max_value().unwrap(), 99.0);
}
