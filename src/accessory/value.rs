//! The nine HAP characteristic value formats, represented as a tagged
//! variant so coercion and validation can branch on the tag (§9 Design
//! Notes — dynamic value typing).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int,
    Float,
    String,
    TlvBase64,
    DataBase64,
}

impl Format {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::TlvBase64 => "tlv8",
            Self::DataBase64 => "data",
        }
    }
}

/// A characteristic's current value, tagged by its HAP format.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int(i32),
    Float(f64),
    String(String),
    Tlv(Vec<u8>),
    Data(Vec<u8>),
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("value does not match declared format")]
    FormatMismatch,

    #[error("value {0} is below minValue {1}")]
    BelowMin(f64, f64),

    #[error("value {0} is above maxValue {1}")]
    AboveMax(f64, f64),

    #[error("value is not one of the declared valid-values")]
    NotInValidValues,

    #[error("value is outside the declared valid-values-range")]
    OutsideValidValuesRange,

    #[error("string exceeds maxLen {0}")]
    StringTooLong(usize),

    #[error("data exceeds maxDataLen {0}")]
    DataTooLong(usize),

    #[error("setter rejected value: {0}")]
    SetterRejected(String),
}

impl Value {
    #[must_use]
    pub fn format(&self) -> Format {
        match self {
            Self::Bool(_) => Format::Bool,
            Self::Uint8(_) => Format::Uint8,
            Self::Uint16(_) => Format::Uint16,
            Self::Uint32(_) => Format::Uint32,
            Self::Uint64(_) => Format::Uint64,
            Self::Int(_) => Format::Int,
            Self::Float(_) => Format::Float,
            Self::String(_) => Format::String,
            Self::Tlv(_) => Format::TlvBase64,
            Self::Data(_) => Format::DataBase64,
        }
    }

    /// Coerce a JSON scalar from a `PUT /characteristics` body into a value
    /// of the given `format` (§4.5 step 2).
    ///
    /// # Errors
    /// Returns [`ValueError::FormatMismatch`] if `json` cannot be
    /// interpreted as `format`.
    pub fn coerce(json: &Json, format: Format) -> Result<Self, ValueError> {
        match format {
            Format::Bool => json.as_bool().map(Self::Bool).ok_or(ValueError::FormatMismatch),
            Format::Uint8 => as_u64(json).and_then(|n| u8::try_from(n).ok()).map(Self::Uint8).ok_or(ValueError::FormatMismatch),
            Format::Uint16 => as_u64(json).and_then(|n| u16::try_from(n).ok()).map(Self::Uint16).ok_or(ValueError::FormatMismatch),
            Format::Uint32 => as_u64(json).and_then(|n| u32::try_from(n).ok()).map(Self::Uint32).ok_or(ValueError::FormatMismatch),
            Format::Uint64 => as_u64(json).map(Self::Uint64).ok_or(ValueError::FormatMismatch),
            Format::Int => as_i64(json).and_then(|n| i32::try_from(n).ok()).map(Self::Int).ok_or(ValueError::FormatMismatch),
            Format::Float => json.as_f64().map(Self::Float).ok_or(ValueError::FormatMismatch),
            Format::String => json.as_str().map(|s| Self::String(s.to_string())).ok_or(ValueError::FormatMismatch),
            Format::TlvBase64 => json
                .as_str()
                .and_then(|s| BASE64.decode(s).ok())
                .map(Self::Tlv)
                .ok_or(ValueError::FormatMismatch),
            Format::DataBase64 => json
                .as_str()
                .and_then(|s| BASE64.decode(s).ok())
                .map(Self::Data)
                .ok_or(ValueError::FormatMismatch),
        }
    }

    /// Render as the JSON scalar HAP puts in a characteristic's `value`
    /// field.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(b) => Json::Bool(*b),
            Self::Uint8(n) => Json::from(*n),
            Self::Uint16(n) => Json::from(*n),
            Self::Uint32(n) => Json::from(*n),
            Self::Uint64(n) => Json::from(*n),
            Self::Int(n) => Json::from(*n),
            Self::Float(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::Tlv(b) | Self::Data(b) => Json::String(BASE64.encode(b)),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Uint8(n) => Some(f64::from(*n)),
            Self::Uint16(n) => Some(f64::from(*n)),
            Self::Uint32(n) => Some(f64::from(*n)),
            Self::Uint64(n) => Some(*n as f64),
            Self::Int(n) => Some(f64::from(*n)),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Apply `minValue`/`maxValue`, `valid-values`, `valid-values-range`,
    /// `maxLen`, `maxDataLen` (§4.5 step 2). `minStep` is intentionally not
    /// enforced — it's advisory per the source behavior this spec carries
    /// forward unchanged.
    pub fn validate(
        &self,
        min_value: Option<f64>,
        max_value: Option<f64>,
        valid_values: Option<&[Value]>,
        valid_values_range: Option<(f64, f64)>,
        max_len: Option<usize>,
        max_data_len: Option<usize>,
    ) -> Result<(), ValueError> {
        if let Some(n) = self.as_f64() {
            if let Some(min) = min_value {
                if n < min {
                    return Err(ValueError::BelowMin(n, min));
                }
            }
            if let Some(max) = max_value {
                if n > max {
                    return Err(ValueError::AboveMax(n, max));
                }
            }
            if let Some((low, high)) = valid_values_range {
                if n < low || n > high {
                    return Err(ValueError::OutsideValidValuesRange);
                }
            }
        }

        if let Some(values) = valid_values {
            if !values.contains(self) {
                return Err(ValueError::NotInValidValues);
            }
        }

        if let Self::String(s) = self {
            if let Some(max) = max_len {
                if s.len() > max {
                    return Err(ValueError::StringTooLong(max));
                }
            }
        }

        if let Self::Data(d) | Self::Tlv(d) = self {
            if let Some(max) = max_data_len {
                if d.len() > max {
                    return Err(ValueError::DataTooLong(max));
                }
            }
        }

        Ok(())
    }
}

fn as_u64(json: &Json) -> Option<u64> {
    json.as_u64().or_else(|| json.as_bool().map(u64::from))
}

fn as_i64(json: &Json) -> Option<i64> {
    json.as_i64()
}
