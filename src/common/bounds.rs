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

//! Confidence bounds on a binomial proportion, adjusted for sampling without
//! replacement.
//!
//! The sampling sketches estimate a subset sum from `k` matches in `n`
//! retained samples. The bounds below are two-sided at kappa = 2 standard
//! deviations, with kappa shrunk by `sqrt(1 - sampling_rate)` to account for
//! the finite population (the "pseudo-hypergeometric" correction).

const DEFAULT_KAPPA: f64 = 2.0;

/// Lower bound on the true match fraction given `k` matches in `n` samples.
pub(crate) fn pseudo_hypergeometric_lb_on_p(n: u64, k: u64, sampling_rate: f64) -> f64 {
    let adjusted_kappa = DEFAULT_KAPPA * (1.0 - sampling_rate).sqrt();
    approximate_lower_bound_on_p(n, k, adjusted_kappa)
}

/// Upper bound on the true match fraction given `k` matches in `n` samples.
pub(crate) fn pseudo_hypergeometric_ub_on_p(n: u64, k: u64, sampling_rate: f64) -> f64 {
    let adjusted_kappa = DEFAULT_KAPPA * (1.0 - sampling_rate).sqrt();
    approximate_upper_bound_on_p(n, k, adjusted_kappa)
}

fn approximate_lower_bound_on_p(n: u64, k: u64, num_std_devs: f64) -> f64 {
    debug_assert!(k <= n);
    if n == 0 || k == 0 {
        0.0
    } else if k == 1 {
        // exact for a single success
        1.0 - (1.0 - delta_of_num_std_devs(num_std_devs)).powf(1.0 / n as f64)
    } else if k == n {
        delta_of_num_std_devs(num_std_devs).powf(1.0 / n as f64)
    } else {
        let x = abramowitz_stegun_formula_26_5_22(
            (n - k) as f64 + 1.0,
            k as f64,
            -num_std_devs,
        );
        1.0 - x
    }
}

fn approximate_upper_bound_on_p(n: u64, k: u64, num_std_devs: f64) -> f64 {
    debug_assert!(k <= n);
    if n == 0 || k == n {
        1.0
    } else if k == n - 1 {
        // exact for a single failure
        (1.0 - delta_of_num_std_devs(num_std_devs)).powf(1.0 / n as f64)
    } else if k == 0 {
        1.0 - delta_of_num_std_devs(num_std_devs).powf(1.0 / n as f64)
    } else {
        let x =
            abramowitz_stegun_formula_26_5_22((n - k) as f64, k as f64 + 1.0, num_std_devs);
        1.0 - x
    }
}

/// Normal quantile approximation to the incomplete beta inverse
/// (Abramowitz & Stegun formula 26.5.22).
fn abramowitz_stegun_formula_26_5_22(a: f64, b: f64, yp: f64) -> f64 {
    let b2m1 = 2.0 * b - 1.0;
    let a2m1 = 2.0 * a - 1.0;
    let lambda = (yp * yp - 3.0) / 6.0;
    let htmp = 1.0 / a2m1 + 1.0 / b2m1;
    let h = 2.0 / htmp;
    let term1 = yp * (h + lambda).sqrt() / h;
    let term2 = 1.0 / b2m1 - 1.0 / a2m1;
    let term3 = lambda + 5.0 / 6.0 - 2.0 / (3.0 * h);
    let w = term1 + term2 * term3;
    a / (a + b * (2.0 * w).exp())
}

fn delta_of_num_std_devs(kappa: f64) -> f64 {
    normal_cdf(-kappa)
}

/// Standard normal CDF via the Abramowitz & Stegun 26.2.17 polynomial.
fn normal_cdf(x: f64) -> f64 {
    if x < 0.0 {
        return 1.0 - normal_cdf(-x);
    }
    let t = 1.0 / (1.0 + 0.2316419 * x);
    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));
    let pdf = (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt();
    1.0 - pdf * poly
}
