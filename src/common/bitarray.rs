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

//! Free functions over a sequence of 64-bit words treated as a bit array.
//!
//! Callers own the word slices; bit indices address bit `i % 64` of word
//! `i / 64`.

pub(crate) fn get_bit(words: &[u64], bit_index: u64) -> bool {
    let word = words[(bit_index >> 6) as usize];
    (word >> (bit_index & 63)) & 1 != 0
}

/// Sets a bit, returning `true` if it was previously clear.
pub(crate) fn set_bit(words: &mut [u64], bit_index: u64) -> bool {
    let word = &mut words[(bit_index >> 6) as usize];
    let mask = 1u64 << (bit_index & 63);
    let was_clear = *word & mask == 0;
    *word |= mask;
    was_clear
}

pub(crate) fn clear_bit(words: &mut [u64], bit_index: u64) {
    words[(bit_index >> 6) as usize] &= !(1u64 << (bit_index & 63));
}

/// Word-wise OR of `other` into `words`; the lengths must match.
pub(crate) fn union_with(words: &mut [u64], other: &[u64]) {
    debug_assert_eq!(words.len(), other.len());
    for (word, other_word) in words.iter_mut().zip(other) {
        *word |= *other_word;
    }
}

/// Word-wise AND of `other` into `words`; the lengths must match.
pub(crate) fn intersect(words: &mut [u64], other: &[u64]) {
    debug_assert_eq!(words.len(), other.len());
    for (word, other_word) in words.iter_mut().zip(other) {
        *word &= *other_word;
    }
}

pub(crate) fn invert(words: &mut [u64]) {
    for word in words.iter_mut() {
        *word = !*word;
    }
}

pub(crate) fn popcount(words: &[u64]) -> u64 {
    words.iter().map(|word| word.count_ones() as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut words = vec![0u64; 4];
        assert!(!get_bit(&words, 77));
        assert!(set_bit(&mut words, 77));
        assert!(get_bit(&words, 77));
        assert!(!set_bit(&mut words, 77));
        clear_bit(&mut words, 77);
        assert!(!get_bit(&words, 77));
        assert_eq!(popcount(&words), 0);
    }

    #[test]
    fn test_union_and_intersect() {
        let mut a = vec![0u64; 2];
        let mut b = vec![0u64; 2];
        set_bit(&mut a, 3);
        set_bit(&mut a, 64);
        set_bit(&mut b, 64);
        set_bit(&mut b, 100);

        let mut u = a.clone();
        union_with(&mut u, &b);
        assert_eq!(popcount(&u), 3);

        intersect(&mut a, &b);
        assert_eq!(popcount(&a), 1);
        assert!(get_bit(&a, 64));
    }

    #[test]
    fn test_invert_is_involution() {
        let mut words = vec![0u64; 3];
        set_bit(&mut words, 0);
        set_bit(&mut words, 191);
        let before = words.clone();
        invert(&mut words);
        assert_eq!(popcount(&words), 3 * 64 - 2);
        invert(&mut words);
        assert_eq!(words, before);
    }
}
