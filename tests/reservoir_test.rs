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
use streamsketches::sampling::ReservoirSketch;
use streamsketches::sampling::ResizeFactor;

#[test]
fn test_invalid_k() {
    let err = ReservoirSketch::<u64>::new(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(ReservoirSketch::<u64>::new(1).is_err());
}

#[test]
fn test_empty() {
    let sketch = ReservoirSketch::<String>::new(10).unwrap();
    assert!(sketch.is_empty());
    assert_eq!(sketch.n(), 0);
    assert_eq!(sketch.num_samples(), 0);
    assert!(sketch.samples().is_empty());
}

#[test]
fn test_exact_mode_is_the_inserted_multiset() {
    let mut sketch = ReservoirSketch::new(10).unwrap();
    for i in 1..=5_u64 {
        sketch.update(i).unwrap();
    }

    assert_eq!(sketch.n(), 5);
    assert_eq!(sketch.num_samples(), 5);
    assert_eq!(sketch.implicit_sample_weight(), 1.0);

    let mut samples = sketch.samples();
    samples.sort_unstable();
    assert_eq!(samples, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_sampling_mode_keeps_k_samples() {
    let k = 100_u32;
    let n = 200_000_u64;
    let mut sketch = ReservoirSketch::new(k).unwrap();
    for i in 0..n {
        sketch.update(i).unwrap();
    }

    assert_eq!(sketch.n(), n);
    assert_eq!(sketch.num_samples(), k as usize);
    assert_eq!(sketch.implicit_sample_weight(), n as f64 / k as f64);

    // every retained sample came from the stream, and no slot repeats
    let mut samples = sketch.samples();
    samples.sort_unstable();
    samples.dedup();
    assert_eq!(samples.len(), k as usize);
    assert!(samples.iter().all(|&v| v < n));
}

#[test]
fn test_samples_is_a_copy() {
    let mut sketch = ReservoirSketch::new(4).unwrap();
    sketch.update(1_u64).unwrap();
    let mut samples = sketch.samples();
    samples.push(99);
    assert_eq!(sketch.num_samples(), 1);
}

#[test]
fn test_all_resize_factors_reach_capacity() {
    for rf in [
        ResizeFactor::X1,
        ResizeFactor::X2,
        ResizeFactor::X4,
        ResizeFactor::X8,
    ] {
        let mut sketch = ReservoirSketch::with_resize_factor(257, rf).unwrap();
        for i in 0..1_000_u64 {
            sketch.update(i).unwrap();
        }
        assert_eq!(sketch.num_samples(), 257, "resize factor {rf:?}");
    }
}

#[test]
fn test_sample_distribution_is_roughly_uniform() {
    // aggregate many reservoirs and check the first stream element's
    // retention frequency is close to k/n
    let k = 32_u32;
    let n = 320_u64;
    let trials = 2_000;
    let mut hits = 0;
    for seed in 0..trials {
        let mut sketch = ReservoirSketch::with_seed(k, seed as u64 + 1).unwrap();
        for i in 0..n {
            sketch.update(i).unwrap();
        }
        if sketch.samples().contains(&0) {
            hits += 1;
        }
    }
    let expected = trials as f64 * k as f64 / n as f64; // 200
    let observed = hits as f64;
    assert!(
        (observed - expected).abs() < 60.0,
        "expected about {expected} retentions, got {observed}"
    );
}

#[test]
fn test_subset_sum_estimate_in_sampling_mode() {
    let mut sketch = ReservoirSketch::with_seed(512, 42).unwrap();
    let n = 100_000_u64;
    for i in 0..n {
        sketch.update(i).unwrap();
    }

    let truth = (n / 4) as f64;
    let summary = sketch.estimate_subset_sum(|&v| v < n / 4);
    assert!(summary.lower <= summary.estimate && summary.estimate <= summary.upper);
    assert!(summary.lower <= truth && truth <= summary.upper);
    assert_eq!(summary.total_weight, n as f64);
    // the point estimate should be in the right neighborhood
    assert!((summary.estimate - truth).abs() < truth * 0.5);
}

#[test]
fn test_downsampled_copy_preserves_n_and_shrinks_k() {
    let mut sketch = ReservoirSketch::with_seed(1024, 9).unwrap();
    for i in 0..4_096_u64 {
        sketch.update(i).unwrap();
    }

    let copy = sketch.downsampled_copy(64).unwrap();
    assert_eq!(copy.k(), 64);
    assert_eq!(copy.num_samples(), 64);
    assert_eq!(copy.n(), 4_096);
    assert_eq!(copy.implicit_sample_weight(), 4_096.0 / 64.0);
}

#[test]
fn test_strings_as_items() {
    let mut sketch = ReservoirSketch::new(4).unwrap();
    for word in ["a", "b", "c"] {
        sketch.update(word.to_string()).unwrap();
    }
    let mut samples = sketch.samples();
    samples.sort();
    assert_eq!(samples, vec!["a", "b", "c"]);
}
