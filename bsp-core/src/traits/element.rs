//! Element and index type constraints
//!
//! Every scalar that can live in a binsparse array implements [`Element`],
//! which ties the Rust type to its metadata label at compile time. Index
//! arrays additionally require [`Index`].

use super::backend::TypedSlice;
use crate::format::DataType;
use bytemuck::Pod;
use core::fmt::Debug;

/// Trait for types that can be stored as matrix values or indices
///
/// The set of implementors is closed: one per [`DataType`]. `usize` and
/// `isize` are intentionally absent since their labels would alias the
/// fixed-width types.
pub trait Element: Pod + PartialEq + Debug + Send + Sync + 'static {
    /// Label written to `data_types`
    const DATA_TYPE: DataType;

    /// Value substituted for pattern-only entries
    const ONE: Self;

    const ZERO: Self;

    /// Combine two values stored at the same coordinate
    fn accumulate(self, other: Self) -> Self;

    /// Mirror value for skew-symmetric expansion
    fn negate(self) -> Self;

    /// Parse one whitespace-delimited text field
    fn parse_token(token: &str) -> Option<Self>;

    /// Wrap a typed slice in the runtime tagged variant
    fn slice_of(values: &[Self]) -> TypedSlice<'_>;

    /// Recover a typed slice from the tagged variant, if the tag matches
    fn from_typed<'a>(slice: &TypedSlice<'a>) -> Option<&'a [Self]>;
}

/// Integer types usable for index and pointer arrays
pub trait Index: Element + Ord {
    fn to_usize(self) -> Option<usize>;

    fn from_usize(value: usize) -> Option<Self>;
}

/// Label for a Rust scalar type
pub fn label_of<T: Element>() -> &'static str {
    T::DATA_TYPE.label()
}

/// Runtime type for a label; fails with `UnsupportedType`
pub fn type_of(label: &str) -> crate::Result<DataType> {
    DataType::from_label(label)
}

macro_rules! impl_integer_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;
                const ONE: Self = 1;
                const ZERO: Self = 0;

                fn accumulate(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }

                fn negate(self) -> Self {
                    self.wrapping_neg()
                }

                fn parse_token(token: &str) -> Option<Self> {
                    // Some writers emit integer fields as "3.0"
                    token.parse::<$ty>().ok().or_else(|| {
                        let value = token.parse::<f64>().ok()?;
                        let in_range = value.is_finite()
                            && value >= <$ty>::MIN as f64
                            && value <= <$ty>::MAX as f64;
                        in_range.then(|| value as $ty)
                    })
                }

                fn slice_of(values: &[Self]) -> TypedSlice<'_> {
                    TypedSlice::$variant(values)
                }

                fn from_typed<'a>(slice: &TypedSlice<'a>) -> Option<&'a [Self]> {
                    match slice {
                        TypedSlice::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }

            impl Index for $ty {
                fn to_usize(self) -> Option<usize> {
                    usize::try_from(self).ok()
                }

                fn from_usize(value: usize) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;
                const ONE: Self = 1.0;
                const ZERO: Self = 0.0;

                fn accumulate(self, other: Self) -> Self {
                    self + other
                }

                fn negate(self) -> Self {
                    -self
                }

                fn parse_token(token: &str) -> Option<Self> {
                    token.parse::<$ty>().ok()
                }

                fn slice_of(values: &[Self]) -> TypedSlice<'_> {
                    TypedSlice::$variant(values)
                }

                fn from_typed<'a>(slice: &TypedSlice<'a>) -> Option<&'a [Self]> {
                    match slice {
                        TypedSlice::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_integer_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

impl_float_element!(f32 => Float32, f64 => Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_at_compile_time() {
        assert_eq!(label_of::<f32>(), "float32");
        assert_eq!(label_of::<u64>(), "uint64");
        assert_eq!(label_of::<i8>(), "int8");
        assert_eq!(type_of("int16"), Ok(DataType::Int16));
        assert!(type_of("usize").is_err());
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(i32::parse_token("-17"), Some(-17));
        assert_eq!(u8::parse_token("3.0"), Some(3));
        assert_eq!(u8::parse_token("300"), None);
        assert_eq!(f64::parse_token("1.5e-3"), Some(1.5e-3));
        assert_eq!(f32::parse_token("abc"), None);
    }

    #[test]
    fn test_accumulate_and_negate() {
        assert_eq!(2.5f64.accumulate(0.5), 3.0);
        assert_eq!(i16::MAX.accumulate(1), i16::MIN);
        assert_eq!(4i32.negate(), -4);
        assert_eq!((-1.5f32).negate(), 1.5);
    }

    #[test]
    fn test_index_conversions() {
        assert_eq!(7u16.to_usize(), Some(7));
        assert_eq!((-1i32).to_usize(), None);
        assert_eq!(u8::from_usize(256), None);
        assert_eq!(i64::from_usize(42), Some(42));
    }

    #[test]
    fn test_typed_slice_recovery() {
        let data = [1.0f32, 2.0];
        let typed = f32::slice_of(&data);
        assert_eq!(typed.data_type(), DataType::Float32);
        assert_eq!(f32::from_typed(&typed), Some(&data[..]));
        assert_eq!(f64::from_typed(&typed), None);
    }
}
