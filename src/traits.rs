//! This module defines shared traits used across different kernels.

use num_traits::{PrimInt, Signed, Unsigned, WrappingAdd, WrappingSub};
use std::fmt::Debug;
use std::hash::Hash;

/// An unsigned lane type that integer streams are physically stored in.
///
/// Signed columns travel through the same lanes as two's complement bit
/// patterns; `to_signed`/`from_signed` reinterpret without changing bits.
pub trait StreamInt:
    PrimInt + Unsigned + WrappingAdd + WrappingSub + Hash + Debug + Default + Send + Sync + 'static
{
    /// The signed counterpart with the same width.
    type Signed: PrimInt + Signed + WrappingAdd + WrappingSub + Debug + Default;

    const BITS: usize;

    fn to_signed(self) -> Self::Signed;
    fn from_signed(value: Self::Signed) -> Self;
    fn from_u64_lossy(value: u64) -> Self;
    fn as_u64(self) -> u64;
}

// Implement the trait for the two lane widths the wire format knows.
macro_rules! impl_stream_int {
    ($U:ty, $S:ty) => {
        impl StreamInt for $U {
            type Signed = $S;
            const BITS: usize = <$U>::BITS as usize;

            #[inline]
            fn to_signed(self) -> $S {
                self as $S
            }
            #[inline]
            fn from_signed(value: $S) -> Self {
                value as $U
            }
            #[inline]
            fn from_u64_lossy(value: u64) -> Self {
                value as $U
            }
            #[inline]
            fn as_u64(self) -> u64 {
                self as u64
            }
        }
    };
}

impl_stream_int!(u32, i32);
impl_stream_int!(u64, i64);
