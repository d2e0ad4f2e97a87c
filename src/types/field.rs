use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Result, RowForgeError};
use crate::types::{SqlKind, Value};

/// A Rust type that a column value can be written into.
///
/// `KIND` selects the typed getter used when fetching the column, and
/// [`SqlField::from_value`] is the assignability check: it fails with
/// [`RowForgeError::TypeMismatch`] when the value does not fit.
///
/// Primitive types (integers, floats, `bool`, `char`) return their zero from
/// [`SqlField::zero_value`]; the bean mapper uses it for NULL columns.
pub trait SqlField: Sized + Send + 'static {
    const KIND: SqlKind;

    fn from_value(value: Value) -> Result<Self>;

    fn zero_value() -> Option<Value> {
        None
    }

    fn is_primitive() -> bool {
        Self::zero_value().is_some()
    }
}

pub(crate) fn mismatch<T>(value: &Value) -> RowForgeError {
    RowForgeError::TypeMismatch(format!(
        "cannot assign {} value to {}",
        value.type_name(),
        std::any::type_name::<T>()
    ))
}

macro_rules! impl_sql_field {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl SqlField for $ty {
            const KIND: SqlKind = SqlKind::$kind;

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }
        }
    };
    ($ty:ty, $kind:ident, $variant:ident, zero = $zero:expr) => {
        impl SqlField for $ty {
            const KIND: SqlKind = SqlKind::$kind;

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }

            fn zero_value() -> Option<Value> {
                Some(Value::$variant($zero))
            }
        }
    };
}

impl_sql_field!(bool, Bool, Bool, zero = false);
impl_sql_field!(i8, Int8, Int8, zero = 0);
impl_sql_field!(i16, Int16, Int16, zero = 0);
impl_sql_field!(i32, Int32, Int32, zero = 0);
impl_sql_field!(i64, Int64, Int64, zero = 0);
impl_sql_field!(f32, Float32, Float32, zero = 0.0);
impl_sql_field!(f64, Float64, Float64, zero = 0.0);
impl_sql_field!(String, String, String);
impl_sql_field!(Vec<u8>, Bytes, Bytes);
impl_sql_field!(Decimal, Decimal, Decimal);
impl_sql_field!(NaiveDate, Date, Date);
impl_sql_field!(NaiveTime, Time, Time);
impl_sql_field!(NaiveDateTime, DateTime, DateTime);
impl_sql_field!(DateTime<FixedOffset>, DateTimeTz, DateTimeTz);
impl_sql_field!(Uuid, Uuid, Uuid);

impl SqlField for char {
    const KIND: SqlKind = SqlKind::Char;

    fn from_value(value: Value) -> Result<Self> {
        if let Value::String(s) = &value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(mismatch::<char>(&value))
    }

    fn zero_value() -> Option<Value> {
        Some(Value::String('\u{0}'.to_string()))
    }
}

impl SqlField for Value {
    const KIND: SqlKind = SqlKind::Any;

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: SqlField> SqlField for Option<T> {
    const KIND: SqlKind = T::KIND;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An enumeration that can be read from a column.
///
/// String columns match a variant by [`SqlEnum::name`], exactly; integer
/// columns select a variant by its position in [`SqlEnum::VARIANTS`].
/// Implement [`SqlField`] with [`sql_enum!`](crate::sql_enum).
pub trait SqlEnum: Copy + Send + 'static {
    const VARIANTS: &'static [Self];

    fn name(&self) -> &'static str;
}

/// Reads an enum variant from an `Enum`-kind value.
pub fn enum_from_value<E: SqlEnum>(value: Value) -> Result<E> {
    let found = match &value {
        Value::String(s) => E::VARIANTS.iter().find(|v| v.name() == s).copied(),
        other => other
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| E::VARIANTS.get(n).copied()),
    };
    found.ok_or_else(|| {
        RowForgeError::TypeMismatch(format!(
            "no {} variant matches {}",
            std::any::type_name::<E>(),
            value
        ))
    })
}

/// Implements [`SqlField`] for a type implementing [`SqlEnum`].
#[macro_export]
macro_rules! sql_enum {
    ($ty:ty) => {
        impl $crate::SqlField for $ty {
            const KIND: $crate::SqlKind = $crate::SqlKind::Enum;

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                $crate::types::enum_from_value(value)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_primitives_have_zero_values() {
        assert_eq!(i32::zero_value(), Some(Value::Int32(0)));
        assert_eq!(bool::zero_value(), Some(Value::Bool(false)));
        assert!(i64::is_primitive());
        assert!(!String::is_primitive());
        assert!(!Option::<i32>::is_primitive());
    }

    #[test]
    fn test_null_into_option_is_none() {
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::from_value(Value::Int32(4)).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_null_into_primitive_is_mismatch() {
        let err = i32::from_value(Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_wrong_variant_is_mismatch() {
        let err = String::from_value(Value::Int32(1)).unwrap_err();
        assert!(err.to_string().contains("Int32"));
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(char::from_value(Value::from("x")).unwrap(), 'x');
        assert!(char::from_value(Value::from("xy")).is_err());
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tier {
        Free,
        Gold,
    }

    impl SqlEnum for Tier {
        const VARIANTS: &'static [Self] = &[Tier::Free, Tier::Gold];

        fn name(&self) -> &'static str {
            match self {
                Tier::Free => "FREE",
                Tier::Gold => "GOLD",
            }
        }
    }

    #[test]
    fn test_enum_by_name_and_ordinal() {
        assert_eq!(enum_from_value::<Tier>(Value::from("GOLD")).unwrap(), Tier::Gold);
        assert_eq!(enum_from_value::<Tier>(Value::Int32(0)).unwrap(), Tier::Free);
        assert!(enum_from_value::<Tier>(Value::from("gold")).is_err());
        assert!(enum_from_value::<Tier>(Value::Int32(5)).is_err());
    }
}
