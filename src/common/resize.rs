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

//! Geometric growth policy for the sampling sketches' backing storage.

use crate::error::Error;

/// Growth multiplier applied when a sampling sketch's storage fills up.
///
/// The numeric value is the multiplier; the serialized form carries its
/// base-2 logarithm in the high two bits of preamble byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFactor {
    /// No growth: allocate the full size up front.
    X1,
    /// Double on each growth step.
    X2,
    /// Quadruple on each growth step.
    X4,
    /// Grow by 8x on each growth step.
    #[default]
    X8,
}

impl ResizeFactor {
    /// Base-2 logarithm of the growth multiplier.
    pub fn lg(self) -> u32 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }

    pub(crate) fn from_lg(lg: u8) -> Result<Self, Error> {
        match lg {
            0 => Ok(ResizeFactor::X1),
            1 => Ok(ResizeFactor::X2),
            2 => Ok(ResizeFactor::X4),
            3 => Ok(ResizeFactor::X8),
            _ => Err(Error::deserial(format!("invalid resize factor lg: {lg}"))),
        }
    }
}

/// Smallest power-of-two exponent for a sampling sketch's initial storage.
pub(crate) const MIN_LG_ARR_ITEMS: u32 = 4;

/// Smallest `lg` with `2^lg >= value`.
pub(crate) fn ceil_lg(value: u64) -> u32 {
    debug_assert!(value > 0);
    64 - (value - 1).leading_zeros()
}

/// Starting power-of-two exponent for storage that grows by `2^lg_rf`
/// toward a target of `2^lg_target`, never starting below `2^min_lg`.
pub(crate) fn starting_sub_multiple(lg_target: u32, lg_rf: u32, min_lg: u32) -> u32 {
    if lg_target <= min_lg {
        min_lg
    } else if lg_rf == 0 {
        lg_target
    } else {
        (lg_target - min_lg) % lg_rf + min_lg
    }
}

/// Caps a grown allocation at the maximum useful size.
///
/// Once one more growth step would reach or overshoot `max_size` there is no
/// point in an intermediate allocation.
pub(crate) fn adjusted_size(max_size: usize, resize_target: usize) -> usize {
    if max_size < resize_target << 1 {
        max_size
    } else {
        resize_target
    }
}
