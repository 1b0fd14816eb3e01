//! Conversion between native Rust values and open values.
//!
//! Implement [`OpenMapped`] to let a Rust type cross the management
//! boundary. Primitives and strings map to themselves; `Vec<T>` maps to an
//! array, `BTreeMap<K, V>` to a two-column `(key, value)` table, enums
//! (via [`open_enum!`](crate::open_enum)) to their constant names, and
//! records to composite values with a fixed schema.
//!
//! Records are implemented by hand on top of [`record_value`] and
//! [`RecordReader`]:
//!
//! ```ignore
//! impl OpenMapped for Point {
//!     fn open_type() -> OpenType { OpenType::Composite(point_schema()) }
//!     fn to_open(&self) -> OpenValue {
//!         record_value(point_schema(), vec![("x", self.x.to_open()), ("y", self.y.to_open())])
//!     }
//!     fn from_open(value: &OpenValue) -> MgmtResult<Self> {
//!         let reader = RecordReader::open(value, &point_schema())?;
//!         Ok(Point { x: reader.field("x")?, y: reader.field("y")? })
//!     }
//! }
//! ```

use crate::error::{MgmtError, MgmtResult};
use crate::object_name::ObjectName;
use crate::open_type::{CompositeType, OpenType, TabularType};
use crate::schema::schemas;
use crate::value::{OpenRecord, OpenTable, OpenValue};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Conversion Trait
// ============================================================================

/// A native type with an open-type mapping
pub trait OpenMapped: Sized {
    /// Values of this type cross the boundary unchanged (no conversion)
    const IDENTITY: bool = false;

    /// Null is a legal native value of this type
    const NULLABLE: bool = false;

    /// Declared open type
    fn open_type() -> OpenType;

    /// Convert to an open value
    fn to_open(&self) -> OpenValue;

    /// Reconstruct from an open value
    fn from_open(value: &OpenValue) -> MgmtResult<Self>;

    /// Reconstruct, mapping null (and, for enums, unknown constants) to `None`
    fn from_open_opt(value: &OpenValue) -> MgmtResult<Option<Self>> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_open(value).map(Some)
        }
    }
}

/// Convert a native value to its open form
pub fn to_open<T: OpenMapped>(value: &T) -> OpenValue {
    value.to_open()
}

/// Reconstruct a native value from its open form
pub fn from_open<T: OpenMapped>(value: &OpenValue) -> MgmtResult<T> {
    T::from_open(value)
}

/// Native type name, as recorded in attribute descriptors
pub fn native_type_name<T>() -> &'static str {
    std::any::type_name::<T>()
}

fn mismatch(expected: &OpenType, got: &OpenValue) -> MgmtError {
    MgmtError::malformed(
        expected.type_name(),
        format!("expected {}, got {}", expected, got.open_type_name()),
    )
}

// ============================================================================
// Identity Mappings
// ============================================================================

macro_rules! identity_mapping {
    ($ty:ty, $open:expr, $variant:ident) => {
        impl OpenMapped for $ty {
            const IDENTITY: bool = true;

            fn open_type() -> OpenType {
                $open
            }

            fn to_open(&self) -> OpenValue {
                OpenValue::$variant(self.clone())
            }

            fn from_open(value: &OpenValue) -> MgmtResult<Self> {
                match value {
                    OpenValue::$variant(inner) => Ok(inner.clone()),
                    other => Err(mismatch(&$open, other)),
                }
            }
        }
    };
}

identity_mapping!(bool, OpenType::BOOLEAN, Boolean);
identity_mapping!(i32, OpenType::INT, Int);
identity_mapping!(i64, OpenType::LONG, Long);
identity_mapping!(f64, OpenType::DOUBLE, Double);
identity_mapping!(String, OpenType::STRING, String);
identity_mapping!(ObjectName, OpenType::OBJECT_NAME, ObjectName);

// Unit type (for operations that return void)
impl OpenMapped for () {
    const IDENTITY: bool = true;
    const NULLABLE: bool = true;

    fn open_type() -> OpenType {
        OpenType::VOID
    }

    fn to_open(&self) -> OpenValue {
        OpenValue::Null
    }

    fn from_open(_value: &OpenValue) -> MgmtResult<Self> {
        Ok(())
    }
}

impl<T: OpenMapped> OpenMapped for Option<T> {
    const IDENTITY: bool = T::IDENTITY;
    const NULLABLE: bool = true;

    fn open_type() -> OpenType {
        T::open_type()
    }

    fn to_open(&self) -> OpenValue {
        match self {
            Some(value) => value.to_open(),
            None => OpenValue::Null,
        }
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        T::from_open_opt(value)
    }
}

// ============================================================================
// Arrays
// ============================================================================

impl<T: OpenMapped> OpenMapped for Vec<T> {
    fn open_type() -> OpenType {
        OpenType::array_of(T::open_type())
    }

    fn to_open(&self) -> OpenValue {
        OpenValue::Array(self.iter().map(OpenMapped::to_open).collect())
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        match value {
            OpenValue::Array(items) => items.iter().map(T::from_open).collect(),
            other => Err(mismatch(&Self::open_type(), other)),
        }
    }
}

// ============================================================================
// Maps (two-column tables)
// ============================================================================

/// Tabular schema used for `BTreeMap<K, V>`
pub fn map_table_type<K: OpenMapped, V: OpenMapped>() -> Arc<TabularType> {
    let kind = std::any::type_name::<BTreeMap<K, V>>();
    schemas().tabular(kind, || {
        TabularType::map_of(
            format!("Map<{},{}>", K::open_type(), V::open_type()),
            K::open_type(),
            V::open_type(),
        )
    })
}

impl<K: OpenMapped + Ord, V: OpenMapped> OpenMapped for BTreeMap<K, V> {
    fn open_type() -> OpenType {
        OpenType::Tabular(map_table_type::<K, V>())
    }

    fn to_open(&self) -> OpenValue {
        let table_type = map_table_type::<K, V>();
        let mut table = OpenTable::new(table_type.clone());
        for (key, value) in self {
            let row = OpenRecord::from_values(
                table_type.row_type().clone(),
                vec![key.to_open(), value.to_open()],
            );
            match row.and_then(|row| table.put(row)) {
                Ok(()) => {}
                Err(err) => tracing::error!(%err, "map entry does not fit its table type"),
            }
        }
        OpenValue::Tabular(table)
    }

    fn from_open(value: &OpenValue) -> MgmtResult<Self> {
        let table = match value {
            OpenValue::Tabular(table) => table,
            other => return Err(mismatch(&Self::open_type(), other)),
        };
        let table_type = table.table_type();
        let row_type = table_type.row_type();
        if !table_type.is_key_value() {
            return Err(MgmtError::malformed(
                table_type.type_name(),
                format!(
                    "expected two columns (key, value), got {}: [{}]",
                    row_type.len(),
                    row_type.field_names().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        for (column, expected) in [("key", K::open_type()), ("value", V::open_type())] {
            if let Some(actual) = row_type.field_type(column) {
                if *actual != expected {
                    return Err(MgmtError::malformed(
                        table_type.type_name(),
                        format!("column `{}` has type {}, expected {}", column, actual, expected),
                    ));
                }
            }
        }
        let mut map = BTreeMap::new();
        for row in table.rows() {
            let key = K::from_open(row.get("key").unwrap_or(&OpenValue::Null))?;
            let value = V::from_open(row.get("value").unwrap_or(&OpenValue::Null))?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// An enumeration carried on the wire by constant name
pub trait OpenEnum: Sized + Copy {
    /// Type name used in diagnostics
    const TYPE_NAME: &'static str;

    /// Wire name of this constant
    fn name(&self) -> &'static str;

    /// Constant with this wire name
    fn from_name(name: &str) -> Option<Self>;

    /// All constants in declaration order
    fn variants() -> &'static [Self];
}

/// Enum reconstruction for a required position. An unknown name degrades
/// to null like [`enum_from_open_opt`], and null is refused here.
pub fn enum_from_open<E: OpenEnum>(value: &OpenValue) -> MgmtResult<E> {
    enum_from_open_opt(value)?.ok_or_else(|| {
        let shown = match value {
            OpenValue::String(name) => format!("unknown constant `{}` degrades to null", name),
            _ => "null".to_string(),
        };
        MgmtError::malformed(E::TYPE_NAME, format!("{}, which a required {} refuses", shown, E::TYPE_NAME))
    })
}

/// Lenient enum reconstruction: null and unknown names become `None`
pub fn enum_from_open_opt<E: OpenEnum>(value: &OpenValue) -> MgmtResult<Option<E>> {
    match value {
        OpenValue::Null => Ok(None),
        OpenValue::String(name) => {
            let constant = E::from_name(name);
            if constant.is_none() {
                tracing::debug!(enum_type = E::TYPE_NAME, name = %name, "unknown enum constant degraded to null");
            }
            Ok(constant)
        }
        other => Err(mismatch(&OpenType::STRING, other)),
    }
}

/// Implement [`OpenEnum`] and [`OpenMapped`] for a fieldless enum.
///
/// ```ignore
/// open_enum!(MemoryType {
///     Heap => "HEAP",
///     NonHeap => "NON_HEAP",
/// });
/// ```
#[macro_export]
macro_rules! open_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $crate::OpenEnum for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some($ty::$variant),)+
                    _ => None,
                }
            }

            fn variants() -> &'static [Self] {
                &[$($ty::$variant),+]
            }
        }

        impl $crate::OpenMapped for $ty {
            fn open_type() -> $crate::OpenType {
                $crate::OpenType::STRING
            }

            fn to_open(&self) -> $crate::OpenValue {
                $crate::OpenValue::String($crate::OpenEnum::name(self).to_string())
            }

            fn from_open(value: &$crate::OpenValue) -> $crate::MgmtResult<Self> {
                $crate::convert::enum_from_open(value)
            }

            fn from_open_opt(value: &$crate::OpenValue) -> $crate::MgmtResult<Option<Self>> {
                $crate::convert::enum_from_open_opt(value)
            }
        }
    };
}

// ============================================================================
// Records
// ============================================================================

/// Build a composite value from named field values.
///
/// A mismatch between the fields and the schema is a bug in the record's
/// mapping; it is logged and the value degrades to null.
pub fn record_value(schema: Arc<CompositeType>, fields: Vec<(&str, OpenValue)>) -> OpenValue {
    match OpenRecord::new(schema, fields) {
        Ok(record) => OpenValue::Composite(record),
        Err(err) => {
            tracing::error!(%err, "record does not match its own schema");
            OpenValue::Null
        }
    }
}

/// Strict, schema-verified field access for reconstructing records
pub struct RecordReader<'a> {
    record: &'a OpenRecord,
    type_name: &'a str,
}

impl<'a> RecordReader<'a> {
    /// Verify `value` against `schema` (field count, names and types) and
    /// open it for reading
    pub fn open(value: &'a OpenValue, schema: &'a CompositeType) -> MgmtResult<Self> {
        match value {
            OpenValue::Composite(record) => {
                record.verify(schema)?;
                Ok(RecordReader {
                    record,
                    type_name: schema.type_name(),
                })
            }
            other => Err(MgmtError::malformed(
                schema.type_name(),
                format!("expected composite, got {}", other.open_type_name()),
            )),
        }
    }

    /// Read and convert one field
    pub fn field<T: OpenMapped>(&self, name: &str) -> MgmtResult<T> {
        let value = self.record.get(name).ok_or_else(|| {
            MgmtError::malformed(self.type_name, format!("missing field `{}`", name))
        })?;
        T::from_open(value).map_err(|err| match err {
            MgmtError::MalformedRecord { reason, .. } => {
                MgmtError::malformed(self.type_name, format!("field `{}`: {}", name, reason))
            }
            other => other,
        })
    }

    /// Underlying record
    pub fn record(&self) -> &OpenRecord {
        self.record
    }
}

// ============================================================================
// Operation Arguments
// ============================================================================

/// Argument tuple of an operation
pub trait OpenArgs: Sized {
    /// Parameter open types, in order
    fn signature() -> Vec<OpenType>;

    /// Convert positional open arguments
    fn from_args(operation: &str, args: &[OpenValue]) -> MgmtResult<Self>;
}

fn convert_arg<T: OpenMapped>(operation: &str, index: usize, value: &OpenValue) -> MgmtResult<T> {
    let invalid = |reason: String| MgmtError::InvalidArgument {
        operation: operation.to_string(),
        index,
        reason,
    };
    if value.is_null() && !T::NULLABLE {
        return Err(invalid(format!("null is not a valid {}", T::open_type())));
    }
    if !value.conforms_to(&T::open_type()) {
        return Err(invalid(format!(
            "expected {}, got {}",
            T::open_type(),
            value.open_type_name()
        )));
    }
    T::from_open(value).map_err(|err| invalid(err.to_string()))
}

fn check_arity(operation: &str, expected: usize, args: &[OpenValue]) -> MgmtResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(MgmtError::InvalidArgument {
            operation: operation.to_string(),
            index: args.len().min(expected),
            reason: format!("expected {} arguments, got {}", expected, args.len()),
        })
    }
}

impl OpenArgs for () {
    fn signature() -> Vec<OpenType> {
        Vec::new()
    }

    fn from_args(operation: &str, args: &[OpenValue]) -> MgmtResult<Self> {
        check_arity(operation, 0, args)
    }
}

macro_rules! tuple_args {
    ($count:expr; $($ty:ident => $idx:tt),+) => {
        impl<$($ty: OpenMapped),+> OpenArgs for ($($ty,)+) {
            fn signature() -> Vec<OpenType> {
                vec![$($ty::open_type()),+]
            }

            fn from_args(operation: &str, args: &[OpenValue]) -> MgmtResult<Self> {
                check_arity(operation, $count, args)?;
                Ok(($(convert_arg::<$ty>(operation, $idx, &args[$idx])?,)+))
            }
        }
    };
}

tuple_args!(1; A => 0);
tuple_args!(2; A => 0, B => 1);
tuple_args!(3; A => 0, B => 1, C => 2);
tuple_args!(4; A => 0, B => 1, C => 2, D => 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Color {
        Red,
        Green,
    }

    crate::open_enum!(Color {
        Red => "RED",
        Green => "GREEN",
    });

    #[test]
    fn test_identity_mappings() {
        assert!(i64::IDENTITY);
        assert!(!Vec::<i64>::IDENTITY);
        assert_eq!(to_open(&42i64), OpenValue::Long(42));
        assert_eq!(from_open::<String>(&OpenValue::from("x")).unwrap(), "x");
        assert!(from_open::<i64>(&OpenValue::Int(1)).is_err());
        assert!(from_open::<i64>(&OpenValue::Null).is_err());
    }

    #[test]
    fn test_null_passes_through_option() {
        assert_eq!(to_open(&None::<i64>), OpenValue::Null);
        assert_eq!(from_open::<Option<i64>>(&OpenValue::Null).unwrap(), None);
        assert_eq!(from_open::<Option<i64>>(&OpenValue::Long(3)).unwrap(), Some(3));
    }

    #[test]
    fn test_array_conversion() {
        let ids = vec![1i64, 2, 3];
        let open = to_open(&ids);
        assert!(open.conforms_to(&Vec::<i64>::open_type()));
        assert_eq!(from_open::<Vec<i64>>(&open).unwrap(), ids);

        let nested = vec![vec!["a".to_string()], vec![]];
        assert_eq!(
            from_open::<Vec<Vec<String>>>(&to_open(&nested)).unwrap(),
            nested
        );
    }

    #[test]
    fn test_map_conversion() {
        let mut props = BTreeMap::new();
        props.insert("java.version".to_string(), "21".to_string());
        props.insert("os.arch".to_string(), "amd64".to_string());
        let open = to_open(&props);
        assert_eq!(open.as_table().unwrap().len(), 2);
        assert_eq!(from_open::<BTreeMap<String, String>>(&open).unwrap(), props);
    }

    #[test]
    fn test_map_rejects_three_columns() {
        let row_type = Arc::new(
            CompositeType::builder("Wide.Entry")
                .field("key", OpenType::STRING)
                .field("value", OpenType::STRING)
                .field("extra", OpenType::STRING)
                .build(),
        );
        let table_type = Arc::new(TabularType::new("Wide", row_type, vec!["key".to_string()]));
        let value = OpenValue::Tabular(OpenTable::new(table_type));
        let err = from_open::<BTreeMap<String, String>>(&value).unwrap_err();
        assert!(matches!(err, MgmtError::MalformedRecord { .. }));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn test_enum_conversion() {
        assert_eq!(to_open(&Color::Green), OpenValue::from("GREEN"));
        assert_eq!(from_open::<Color>(&OpenValue::from("RED")).unwrap(), Color::Red);
        assert!(from_open::<Color>(&OpenValue::from("BLUE")).is_err());
        // Unknown constants from a newer peer degrade to null
        assert_eq!(from_open::<Option<Color>>(&OpenValue::from("BLUE")).unwrap(), None);
        assert_eq!(Color::variants().len(), 2);
    }

    #[test]
    fn test_args_conversion() {
        let args = vec![OpenValue::Long(7), OpenValue::Int(3)];
        let (id, depth) = <(i64, i32)>::from_args("getThreadInfo", &args).unwrap();
        assert_eq!((id, depth), (7, 3));

        let err = <(i64,)>::from_args("getThreadInfo", &[OpenValue::from("7")]).unwrap_err();
        assert!(matches!(err, MgmtError::InvalidArgument { index: 0, .. }));

        let err = <(i64,)>::from_args("getThreadInfo", &[]).unwrap_err();
        assert!(err.to_string().contains("expected 1 arguments, got 0"));

        assert_eq!(
            <(i64, i32)>::signature(),
            vec![OpenType::LONG, OpenType::INT]
        );
    }
}
