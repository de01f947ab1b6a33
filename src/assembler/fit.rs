/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The displacement/immediate fit checker. Kept as
//! one small function with exhaustive unit tests, per spec §9's "bit-field
//! encoding" note.

/// The outcome of a successful fit check: the raw bits to store in the
/// slot, already masked to its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitResult {
    pub bits: u32,
}

/// Checks whether `value` fits a slot of width `bits` with the given
/// signedness and scale, optionally as a PC-relative displacement from
/// `pc` to `value`.
///
/// - `pc_relative`: if `Some(pc)`, `value` is treated as a target address
///   and the stored displacement is `(value - pc) / scale`.
/// - Otherwise `value` is divided by `scale` directly (usually `scale=1`).
///
/// Returns `None` if the division is inexact or the result is out of the
/// representable range for `bits`/`signed`.
pub fn check_fit(value: i64, bits: u32, signed: bool, scale: u32, pc_relative: Option<i64>) -> Option<FitResult> {
    let scale = scale.max(1) as i64;
    let numerator = match pc_relative {
        Some(pc) => value - pc,
        None => value,
    };
    if numerator % scale != 0 {
        return None;
    }
    let d = numerator / scale;

    let (lo, hi): (i64, i64) = if signed {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    } else {
        (0, (1i64 << bits) - 1)
    };
    if d < lo || d > hi {
        return None;
    }

    let mask: u64 = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let bits_value = (d as u64) & mask;
    Some(FitResult {
        bits: bits_value as u32,
    })
}
