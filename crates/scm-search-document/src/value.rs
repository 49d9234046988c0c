//! Field kinds and values.
//!
//! Every indexed property is one of five kinds. Rust types opt in through [`FieldType`]
//! (scalars) or [`IndexedEnum`] (enums encoded by variant name).

use std::{
    any::{TypeId, type_name},
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Serialize, Serializer};

/// Kind of an indexed property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text or identifiers.
    Text,
    /// Signed or small unsigned integers, stored as `i64`.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// Point in time, stored as epoch milliseconds.
    Timestamp,
    /// Enum variant, stored by name.
    Enum,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// A single property value extracted from an indexed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// Epoch milliseconds; negative before 1970.
    Timestamp(i64),
    /// Enum variant name.
    Enum(String),
}

impl FieldValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Integer(_) => FieldKind::Integer,
            Self::Boolean(_) => FieldKind::Boolean,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::Enum(_) => FieldKind::Enum,
        }
    }

    /// Creates a timestamp value from a system time.
    pub fn timestamp(time: SystemTime) -> Self {
        Self::Timestamp(epoch_millis(time))
    }

    /// Returns the value as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Enum(text) => Some(text),
            _ => None,
        }
    }

    /// Converts a timestamp value back into a system time.
    pub fn as_system_time(&self) -> Option<SystemTime> {
        match self {
            Self::Timestamp(millis) => Some(from_epoch_millis(*millis)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) | Self::Enum(text) => f.write_str(text),
            Self::Integer(value) | Self::Timestamp(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) | Self::Enum(text) => serializer.serialize_str(text),
            Self::Integer(value) | Self::Timestamp(value) => serializer.serialize_i64(*value),
            Self::Boolean(value) => serializer.serialize_bool(*value),
        }
    }
}

/// Milliseconds since the Unix epoch, saturating at the `i64` range.
pub fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |m| -m),
    }
}

/// Inverse of [`epoch_millis`].
pub fn from_epoch_millis(millis: i64) -> SystemTime {
    let offset = Duration::from_millis(millis.unsigned_abs());
    if millis >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Rust types with a direct index encoding.
pub trait FieldType: 'static {
    /// Kind every value of this type encodes to.
    const KIND: FieldKind;

    /// Converts the value into its index representation.
    fn into_value(self) -> FieldValue;
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn into_value(self) -> FieldValue {
        FieldValue::Text(self)
    }
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn into_value(self) -> FieldValue {
        FieldValue::Boolean(self)
    }
}

impl FieldType for SystemTime {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn into_value(self) -> FieldValue {
        FieldValue::timestamp(self)
    }
}

/// Implements [`FieldType`] for integers that widen losslessly into `i64`.
macro_rules! integer_field_type {
    ($($ty:ty),*) => {
        $(
            impl FieldType for $ty {
                const KIND: FieldKind = FieldKind::Integer;

                fn into_value(self) -> FieldValue {
                    FieldValue::Integer(i64::from(self))
                }
            }
        )*
    };
}

integer_field_type!(i8, i16, i32, i64, u8, u16, u32);

/// Enums indexed by variant name.
///
/// Queries match variant names case-insensitively.
pub trait IndexedEnum: 'static {
    /// Returns the name of this variant.
    fn variant_name(&self) -> &'static str;
}

/// Looks up the kind of a value type that is only known by its Rust type.
///
/// Returns the type's name alongside, for error messages. Enums are not recognized here;
/// they must be registered through their [`IndexedEnum`] implementation.
pub fn kind_of<V: 'static>() -> (Option<FieldKind>, &'static str) {
    let id = TypeId::of::<V>();
    let integers = [
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
    ];
    let kind = if id == TypeId::of::<String>() {
        Some(FieldKind::Text)
    } else if id == TypeId::of::<bool>() {
        Some(FieldKind::Boolean)
    } else if id == TypeId::of::<SystemTime>() {
        Some(FieldKind::Timestamp)
    } else if integers.contains(&id) {
        Some(FieldKind::Integer)
    } else {
        None
    };
    (kind, type_name::<V>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_widen() {
        assert_eq!(42u32.into_value(), FieldValue::Integer(42));
        assert_eq!((-7i8).into_value(), FieldValue::Integer(-7));
        assert_eq!(<u16 as FieldType>::KIND, FieldKind::Integer);
    }

    #[test]
    fn timestamps_round_trip_through_millis() {
        let time = UNIX_EPOCH + Duration::from_millis(1_634_567_890_123);
        let value = time.into_value();
        assert_eq!(value, FieldValue::Timestamp(1_634_567_890_123));
        assert_eq!(value.as_system_time(), Some(time));
    }

    #[test]
    fn timestamps_before_epoch_are_negative() {
        let time = UNIX_EPOCH - Duration::from_millis(1_500);
        assert_eq!(epoch_millis(time), -1_500);
        assert_eq!(from_epoch_millis(-1_500), time);
    }

    #[test]
    fn kind_lookup() {
        assert_eq!(kind_of::<String>().0, Some(FieldKind::Text));
        assert_eq!(kind_of::<u8>().0, Some(FieldKind::Integer));
        assert_eq!(kind_of::<SystemTime>().0, Some(FieldKind::Timestamp));
        let (kind, name) = kind_of::<f64>();
        assert_eq!(kind, None);
        assert_eq!(name, "f64");
        assert_eq!(kind_of::<u64>().0, None);
        assert_eq!(kind_of::<Vec<String>>().0, None);
    }

    #[test]
    fn values_serialize_as_plain_json() {
        assert_eq!(
            serde_json::to_string(&FieldValue::Text("Arthur".into())).unwrap(),
            "\"Arthur\""
        );
        assert_eq!(serde_json::to_string(&FieldValue::Integer(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&FieldValue::Boolean(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&FieldValue::Timestamp(-5)).unwrap(), "-5");
        assert_eq!(
            serde_json::to_string(&FieldValue::Enum("PENGUIN".into())).unwrap(),
            "\"PENGUIN\""
        );
    }
}
