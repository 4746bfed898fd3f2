// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository, or online at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cast utilities.

/// A trait for safe, simple, and infallible casts.
///
/// `CastFrom` is like [`std::convert::From`], but it is implemented for some
/// platform-specific casts that are missing from the standard library. For
/// example, there is no `From<u64> for usize` implementation, because Rust may
/// someday support platforms where usize is smaller than 64 bits. Since we
/// don't care about such platforms, we are happy to provide one.
///
/// `CastFrom` should be preferred to the `as` operator, since the `as` operator
/// will silently truncate if the target type is smaller than the source type.
pub trait CastFrom<T> {
    /// Performs the cast.
    fn cast_from(from: T) -> Self;
}

macro_rules! cast_from {
    ($from:ty, $to:ty) => {
        impl CastFrom<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn cast_from(from: $from) -> $to {
                from as $to
            }
        }
    };
}

cast_from!(u8, usize);
cast_from!(u32, usize);
#[cfg(target_pointer_width = "64")]
cast_from!(u64, usize);
cast_from!(usize, u64);
cast_from!(usize, i128);
cast_from!(usize, u128);
#[cfg(target_pointer_width = "64")]
cast_from!(usize, i64);
#[cfg(target_pointer_width = "64")]
cast_from!(i64, isize);
cast_from!(isize, i64);

/// A trait for casts that may lose information, for example `i64` to `usize`
/// when the source is negative.
pub trait TryCastFrom<T>: Sized {
    /// Attempts the cast, returning `None` if the value does not fit.
    fn try_cast_from(from: T) -> Option<Self>;
}

macro_rules! try_cast_from {
    ($from:ty, $to:ty) => {
        impl TryCastFrom<$from> for $to {
            fn try_cast_from(from: $from) -> Option<$to> {
                <$to>::try_from(from).ok()
            }
        }
    };
}

try_cast_from!(i64, usize);
try_cast_from!(i128, usize);
try_cast_from!(i128, i64);
try_cast_from!(u64, i64);

/// 2^127, the smallest `f64` above `i128::MAX`.
const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl TryCastFrom<f64> for i128 {
    /// Truncates toward zero. Fails for NaN, the infinities and values
    /// outside the range of `i128`.
    #[allow(clippy::as_conversions)]
    fn try_cast_from(from: f64) -> Option<i128> {
        if from.is_finite() && from >= -I128_BOUND && from < I128_BOUND {
            Some(from.trunc() as i128)
        } else {
            None
        }
    }
}

/// A trait for numeric casts that may lose precision, such as `usize` to
/// `f64` for large values.
pub trait CastLossy<T> {
    /// Performs the cast, rounding to the nearest representable value.
    fn cast_lossy(from: T) -> Self;
}

macro_rules! cast_lossy {
    ($from:ty, $to:ty) => {
        impl CastLossy<$from> for $to {
            #[allow(clippy::as_conversions)]
            fn cast_lossy(from: $from) -> $to {
                from as $to
            }
        }
    };
}

cast_lossy!(usize, f64);
cast_lossy!(i64, f64);
cast_lossy!(i128, f64);
cast_lossy!(f64, f32);
