#![forbid(unsafe_code)]

use arrow_schema::DataType;
use serde::Serialize;
use std::fmt;

/// Physical type of an ingested column.
///
/// Numeric variants form a promotion lattice (see [`ColumnType::promote`]). `Utf8` is only
/// used for the key column and absorbs everything it is promoted with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Class {
    Unsigned,
    Signed,
    Float,
    Text,
}

impl ColumnType {
    fn class(self) -> Class {
        match self {
            ColumnType::UInt8 | ColumnType::UInt16 | ColumnType::UInt32 | ColumnType::UInt64 => {
                Class::Unsigned
            }
            ColumnType::Int8 | ColumnType::Int16 | ColumnType::Int32 | ColumnType::Int64 => {
                Class::Signed
            }
            ColumnType::Float32 | ColumnType::Float64 => Class::Float,
            ColumnType::Utf8 => Class::Text,
        }
    }

    /// Width in bits. `Utf8` reports 0.
    pub fn bits(self) -> u32 {
        match self {
            ColumnType::UInt8 | ColumnType::Int8 => 8,
            ColumnType::UInt16 | ColumnType::Int16 => 16,
            ColumnType::UInt32 | ColumnType::Int32 | ColumnType::Float32 => 32,
            ColumnType::UInt64 | ColumnType::Int64 | ColumnType::Float64 => 64,
            ColumnType::Utf8 => 0,
        }
    }

    pub fn is_numeric(self) -> bool {
        self != ColumnType::Utf8
    }

    pub fn is_integer(self) -> bool {
        matches!(self.class(), Class::Unsigned | Class::Signed)
    }

    fn signed_with_bits(bits: u32) -> ColumnType {
        match bits {
            0..=8 => ColumnType::Int8,
            9..=16 => ColumnType::Int16,
            17..=32 => ColumnType::Int32,
            33..=64 => ColumnType::Int64,
            _ => ColumnType::Float64,
        }
    }

    /// Narrowest integer type holding every value in `min..=max`.
    ///
    /// Non-negative ranges get an unsigned type. Ranges that need more than 64 bits fall
    /// back to `Float64`.
    pub fn for_integer_range(min: i128, max: i128) -> ColumnType {
        if min >= 0 {
            if max <= u8::MAX as i128 {
                ColumnType::UInt8
            } else if max <= u16::MAX as i128 {
                ColumnType::UInt16
            } else if max <= u32::MAX as i128 {
                ColumnType::UInt32
            } else if max <= u64::MAX as i128 {
                ColumnType::UInt64
            } else {
                ColumnType::Float64
            }
        } else if min >= i8::MIN as i128 && max <= i8::MAX as i128 {
            ColumnType::Int8
        } else if min >= i16::MIN as i128 && max <= i16::MAX as i128 {
            ColumnType::Int16
        } else if min >= i32::MIN as i128 && max <= i32::MAX as i128 {
            ColumnType::Int32
        } else if min >= i64::MIN as i128 && max <= i64::MAX as i128 {
            ColumnType::Int64
        } else {
            ColumnType::Float64
        }
    }

    /// Least upper bound of two types in the promotion lattice.
    ///
    /// Follows NumPy's `result_type` for the widths modelled here: unsigned and signed
    /// integers meet at a signed type wide enough for both ranges, `UInt64` and signed meet
    /// at `Float64`, and integers wider than 16 bits force `Float32` up to `Float64`.
    pub fn promote(self, other: ColumnType) -> ColumnType {
        if self == other {
            return self;
        }

        let wider = if self.bits() >= other.bits() {
            self
        } else {
            other
        };

        match (self.class(), other.class()) {
            (Class::Text, _) | (_, Class::Text) => ColumnType::Utf8,
            (a, b) if a == b => wider,
            (Class::Unsigned, Class::Signed) | (Class::Signed, Class::Unsigned) => {
                let (unsigned, signed) = if self.class() == Class::Unsigned {
                    (self, other)
                } else {
                    (other, self)
                };
                ColumnType::signed_with_bits((unsigned.bits() * 2).max(signed.bits()))
            }
            _ => {
                let (int, float) = if self.class() == Class::Float {
                    (other, self)
                } else {
                    (self, other)
                };
                if float == ColumnType::Float32 && int.bits() <= 16 {
                    ColumnType::Float32
                } else {
                    ColumnType::Float64
                }
            }
        }
    }

    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::UInt8 => DataType::UInt8,
            ColumnType::UInt16 => DataType::UInt16,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::Int8 => DataType::Int8,
            ColumnType::Int16 => DataType::Int16,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }

    pub fn from_arrow(data_type: &DataType) -> Option<ColumnType> {
        Some(match data_type {
            DataType::UInt8 => ColumnType::UInt8,
            DataType::UInt16 => ColumnType::UInt16,
            DataType::UInt32 => ColumnType::UInt32,
            DataType::UInt64 => ColumnType::UInt64,
            DataType::Int8 => ColumnType::Int8,
            DataType::Int16 => ColumnType::Int16,
            DataType::Int32 => ColumnType::Int32,
            DataType::Int64 => ColumnType::Int64,
            DataType::Float32 => ColumnType::Float32,
            DataType::Float64 => ColumnType::Float64,
            DataType::Utf8 => ColumnType::Utf8,
            _ => return None,
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::UInt8 => "uint8",
            ColumnType::UInt16 => "uint16",
            ColumnType::UInt32 => "uint32",
            ColumnType::UInt64 => "uint64",
            ColumnType::Int8 => "int8",
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::Utf8 => "utf8",
        })
    }
}

/// A parsed measurement field.
///
/// Fields written as integer literals stay integers so the profiler can pick an integer
/// width; anything with a fraction or exponent is a float.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parse a measurement field. Surrounding ASCII whitespace is ignored.
    ///
    /// Integer literals that overflow 64 bits are read as floats. NaN and infinities are
    /// rejected.
    pub fn parse(text: &str) -> std::result::Result<Number, &'static str> {
        let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
        if text.is_empty() {
            return Err("is empty");
        }

        let integer_literal = text
            .strip_prefix(['+', '-'])
            .unwrap_or(text)
            .bytes()
            .all(|b| b.is_ascii_digit());
        if integer_literal {
            if let Ok(v) = text.parse::<u64>() {
                return Ok(Number::UInt(v));
            }
            if let Ok(v) = text.parse::<i64>() {
                return Ok(Number::Int(v));
            }
        }

        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Number::Float(v)),
            Ok(_) => Err("is not finite"),
            Err(_) => Err("is not numeric"),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::UInt(v) => v as f64,
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// The value as `f64`, if an integer literal converts without rounding.
    pub fn to_f64_lossless(self) -> Option<f64> {
        match self {
            Number::UInt(v) => {
                let wide = v as f64;
                (wide as i128 == v as i128).then_some(wide)
            }
            Number::Int(v) => {
                let wide = v as f64;
                (wide as i128 == v as i128).then_some(wide)
            }
            Number::Float(v) => Some(v),
        }
    }

    /// The value as `f32`, if narrowing loses nothing of its shortest decimal form.
    pub fn to_f32_lossless(self) -> Option<f32> {
        let wide = self.as_f64();
        let narrow = wide as f32;
        let exact = match self {
            Number::UInt(v) => narrow as i128 == v as i128,
            Number::Int(v) => narrow as i128 == v as i128,
            Number::Float(_) => narrow.is_finite() && widen_f32(narrow) == wide,
        };
        exact.then_some(narrow)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::UInt(v) => write!(f, "{v}"),
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Widen an `f32` through its shortest decimal representation.
///
/// `12.3_f32 as f64` is `12.300000190734863`; this returns `12.3`, i.e. the value that was
/// written in the input before it was narrowed.
pub(crate) fn widen_f32(value: f32) -> f64 {
    let direct = value as f64;
    if direct.fract() == 0.0 {
        return direct;
    }
    value.to_string().parse().unwrap_or(direct)
}
