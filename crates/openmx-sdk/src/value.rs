//! OpenValue: wire-safe values crossing the management boundary
//!
//! Every attribute read, attribute write, operation argument and
//! notification payload travels as an [`OpenValue`]. Composite values carry
//! their own schema so a receiver can interpret them without knowing the
//! native record type that produced them.

use crate::error::{MgmtError, MgmtResult};
use crate::object_name::ObjectName;
use crate::open_type::{CompositeType, OpenType, SimpleType, TabularType};
use std::sync::Arc;

// ============================================================================
// Open Value
// ============================================================================

/// A value of some open type
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpenValue {
    /// Absent value; conforms to every open type
    #[default]
    Null,
    /// `boolean`
    Boolean(bool),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `double`
    Double(f64),
    /// `string`
    String(String),
    /// `objectname`
    ObjectName(ObjectName),
    /// Array of values of one element type
    Array(Vec<OpenValue>),
    /// Record with a fixed schema
    Composite(OpenRecord),
    /// Table of records
    Tabular(OpenTable),
}

impl OpenValue {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, OpenValue::Null)
    }

    /// Short label of the runtime kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            OpenValue::Null => "null",
            OpenValue::Boolean(_) => "boolean",
            OpenValue::Int(_) => "int",
            OpenValue::Long(_) => "long",
            OpenValue::Double(_) => "double",
            OpenValue::String(_) => "string",
            OpenValue::ObjectName(_) => "objectname",
            OpenValue::Array(_) => "array",
            OpenValue::Composite(_) => "composite",
            OpenValue::Tabular(_) => "tabular",
        }
    }

    /// Runtime type name, following the signature naming of [`OpenType`]
    pub fn open_type_name(&self) -> String {
        match self {
            OpenValue::Array(items) => match items.iter().find(|item| !item.is_null()) {
                Some(first) => format!("{}[]", first.open_type_name()),
                None => "array".to_string(),
            },
            OpenValue::Composite(record) => record.schema().type_name().to_string(),
            OpenValue::Tabular(table) => table.table_type().type_name().to_string(),
            other => other.kind_name().to_string(),
        }
    }

    /// True if this value is a valid instance of `ty`
    pub fn conforms_to(&self, ty: &OpenType) -> bool {
        match (self, ty) {
            (OpenValue::Null, _) => true,
            (OpenValue::Boolean(_), OpenType::Simple(SimpleType::Boolean)) => true,
            (OpenValue::Int(_), OpenType::Simple(SimpleType::Int)) => true,
            (OpenValue::Long(_), OpenType::Simple(SimpleType::Long)) => true,
            (OpenValue::Double(_), OpenType::Simple(SimpleType::Double)) => true,
            (OpenValue::String(_), OpenType::Simple(SimpleType::String)) => true,
            (OpenValue::ObjectName(_), OpenType::Simple(SimpleType::ObjectName)) => true,
            (OpenValue::Array(items), OpenType::Array(element)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            (OpenValue::Composite(record), OpenType::Composite(schema)) => {
                record.schema().as_ref() == schema.as_ref()
            }
            (OpenValue::Tabular(table), OpenType::Tabular(schema)) => {
                table.table_type().as_ref() == schema.as_ref()
            }
            _ => false,
        }
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OpenValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract int value
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            OpenValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract long value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OpenValue::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract double value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OpenValue::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OpenValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract array items
    pub fn as_array(&self) -> Option<&[OpenValue]> {
        match self {
            OpenValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Extract record
    pub fn as_record(&self) -> Option<&OpenRecord> {
        match self {
            OpenValue::Composite(record) => Some(record),
            _ => None,
        }
    }

    /// Extract table
    pub fn as_table(&self) -> Option<&OpenTable> {
        match self {
            OpenValue::Tabular(table) => Some(table),
            _ => None,
        }
    }
}

impl From<bool> for OpenValue {
    fn from(b: bool) -> Self {
        OpenValue::Boolean(b)
    }
}

impl From<i32> for OpenValue {
    fn from(i: i32) -> Self {
        OpenValue::Int(i)
    }
}

impl From<i64> for OpenValue {
    fn from(i: i64) -> Self {
        OpenValue::Long(i)
    }
}

impl From<f64> for OpenValue {
    fn from(f: f64) -> Self {
        OpenValue::Double(f)
    }
}

impl From<&str> for OpenValue {
    fn from(s: &str) -> Self {
        OpenValue::String(s.to_string())
    }
}

impl From<String> for OpenValue {
    fn from(s: String) -> Self {
        OpenValue::String(s)
    }
}

impl From<OpenRecord> for OpenValue {
    fn from(record: OpenRecord) -> Self {
        OpenValue::Composite(record)
    }
}

// ============================================================================
// Open Record
// ============================================================================

/// Composite value: a schema and one value per schema field, in order
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRecord {
    schema: Arc<CompositeType>,
    values: Vec<OpenValue>,
}

impl OpenRecord {
    /// Build a record from named values.
    ///
    /// Every schema field must be given exactly once and every value must
    /// conform to its field type.
    pub fn new(schema: Arc<CompositeType>, fields: Vec<(&str, OpenValue)>) -> MgmtResult<Self> {
        let mut slots: Vec<Option<OpenValue>> = vec![None; schema.len()];
        for (name, value) in fields {
            let idx = schema.index_of(name).ok_or_else(|| {
                MgmtError::malformed(schema.type_name(), format!("unexpected field `{}`", name))
            })?;
            if slots[idx].is_some() {
                return Err(MgmtError::malformed(
                    schema.type_name(),
                    format!("field `{}` given twice", name),
                ));
            }
            slots[idx] = Some(value);
        }
        let mut values = Vec::with_capacity(slots.len());
        for (item, slot) in schema.items().iter().zip(slots) {
            match slot {
                Some(value) => values.push(value),
                None => {
                    return Err(MgmtError::malformed(
                        schema.type_name(),
                        format!("missing field `{}`", item.name),
                    ))
                }
            }
        }
        Self::from_values(schema, values)
    }

    /// Build a record from values in schema order
    pub fn from_values(schema: Arc<CompositeType>, values: Vec<OpenValue>) -> MgmtResult<Self> {
        if values.len() != schema.len() {
            return Err(MgmtError::malformed(
                schema.type_name(),
                format!("expected {} fields, got {}", schema.len(), values.len()),
            ));
        }
        for (item, value) in schema.items().iter().zip(values.iter()) {
            if !value.conforms_to(&item.open_type) {
                return Err(MgmtError::malformed(
                    schema.type_name(),
                    format!(
                        "field `{}` has type {}, expected {}",
                        item.name,
                        value.open_type_name(),
                        item.open_type
                    ),
                ));
            }
        }
        Ok(OpenRecord { schema, values })
    }

    /// Schema this record was built against
    pub fn schema(&self) -> &Arc<CompositeType> {
        &self.schema
    }

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&OpenValue> {
        self.schema.index_of(name).map(|idx| &self.values[idx])
    }

    /// Values in schema order
    pub fn values(&self) -> &[OpenValue] {
        &self.values
    }

    /// `(field name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OpenValue)> {
        self.schema.field_names().zip(self.values.iter())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that this record has exactly the fields of `expected`.
    ///
    /// Reports the first missing field, then the first unexpected field,
    /// then the first field whose type differs.
    pub fn verify(&self, expected: &CompositeType) -> MgmtResult<()> {
        let type_name = expected.type_name();
        for item in expected.items() {
            if !self.schema.contains(&item.name) {
                return Err(MgmtError::malformed(
                    type_name,
                    format!("missing field `{}`", item.name),
                ));
            }
        }
        for name in self.schema.field_names() {
            if !expected.contains(name) {
                return Err(MgmtError::malformed(
                    type_name,
                    format!("unexpected field `{}`", name),
                ));
            }
        }
        for item in expected.items() {
            if let Some(actual) = self.schema.field_type(&item.name) {
                if *actual != item.open_type {
                    return Err(MgmtError::malformed(
                        type_name,
                        format!(
                            "field `{}` has type {}, expected {}",
                            item.name, actual, item.open_type
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Open Table
// ============================================================================

/// Tabular value: rows of one composite type, unique by index columns
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTable {
    table_type: Arc<TabularType>,
    rows: Vec<OpenRecord>,
}

impl OpenTable {
    /// Create an empty table
    pub fn new(table_type: Arc<TabularType>) -> Self {
        OpenTable {
            table_type,
            rows: Vec::new(),
        }
    }

    /// Append a row. The row must match the row type and its index key
    /// must not already be present.
    pub fn put(&mut self, row: OpenRecord) -> MgmtResult<()> {
        let row_type = self.table_type.row_type();
        if row.schema().as_ref() != row_type.as_ref() {
            return Err(MgmtError::malformed(
                self.table_type.type_name(),
                format!(
                    "row of type {} does not match {}",
                    row.schema().type_name(),
                    row_type.type_name()
                ),
            ));
        }
        let key = self.index_of(&row);
        if self.rows.iter().any(|existing| self.index_of(existing) == key) {
            return Err(MgmtError::malformed(
                self.table_type.type_name(),
                "duplicate row index",
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Row whose index columns equal `key`
    pub fn get(&self, key: &[OpenValue]) -> Option<&OpenRecord> {
        self.rows
            .iter()
            .find(|row| self.index_of(row).into_iter().eq(key.iter()))
    }

    fn index_of<'a>(&self, row: &'a OpenRecord) -> Vec<&'a OpenValue> {
        self.table_type
            .index_names()
            .iter()
            .filter_map(|name| row.get(name))
            .collect()
    }

    /// Table schema
    pub fn table_type(&self) -> &Arc<TabularType> {
        &self.table_type
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[OpenRecord] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_schema() -> Arc<CompositeType> {
        Arc::new(
            CompositeType::builder("MemoryUsage")
                .field("init", OpenType::LONG)
                .field("used", OpenType::LONG)
                .field("committed", OpenType::LONG)
                .field("max", OpenType::LONG)
                .build(),
        )
    }

    fn usage(used: i64) -> OpenRecord {
        OpenRecord::new(
            usage_schema(),
            vec![
                ("init", OpenValue::Long(0)),
                ("used", OpenValue::Long(used)),
                ("committed", OpenValue::Long(used)),
                ("max", OpenValue::Long(-1)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_conformance() {
        assert!(OpenValue::Long(1).conforms_to(&OpenType::LONG));
        assert!(!OpenValue::Int(1).conforms_to(&OpenType::LONG));
        assert!(OpenValue::Null.conforms_to(&OpenType::LONG));
        assert!(OpenValue::Array(vec![OpenValue::from("a"), OpenValue::Null])
            .conforms_to(&OpenType::array_of(OpenType::STRING)));
        assert!(!OpenValue::Array(vec![OpenValue::Long(1)])
            .conforms_to(&OpenType::array_of(OpenType::STRING)));

        let record = OpenValue::Composite(usage(10));
        assert!(record.conforms_to(&OpenType::Composite(usage_schema())));
    }

    #[test]
    fn test_record_field_order_is_schema_order() {
        let record = OpenRecord::new(
            usage_schema(),
            vec![
                ("max", OpenValue::Long(100)),
                ("used", OpenValue::Long(5)),
                ("init", OpenValue::Long(1)),
                ("committed", OpenValue::Long(10)),
            ],
        )
        .unwrap();
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["init", "used", "committed", "max"]);
        assert_eq!(record.get("max"), Some(&OpenValue::Long(100)));
    }

    #[test]
    fn test_record_rejects_missing_and_mistyped() {
        let err = OpenRecord::new(usage_schema(), vec![("init", OpenValue::Long(0))]).unwrap_err();
        assert!(err.to_string().contains("missing field `used`"));

        let err = OpenRecord::new(
            usage_schema(),
            vec![
                ("init", OpenValue::Long(0)),
                ("used", OpenValue::from("lots")),
                ("committed", OpenValue::Long(0)),
                ("max", OpenValue::Long(0)),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("field `used` has type string"));
    }

    #[test]
    fn test_verify_names_offending_field() {
        let extra = Arc::new(
            CompositeType::builder("MemoryUsage")
                .field("init", OpenType::LONG)
                .field("used", OpenType::LONG)
                .field("committed", OpenType::LONG)
                .field("max", OpenType::LONG)
                .field("peak", OpenType::LONG)
                .build(),
        );
        let record = OpenRecord::from_values(
            extra,
            vec![OpenValue::Long(0); 5],
        )
        .unwrap();
        let err = record.verify(&usage_schema()).unwrap_err();
        assert!(err.to_string().contains("unexpected field `peak`"));

        assert!(usage(1).verify(&usage_schema()).is_ok());
    }

    #[test]
    fn test_table_put_and_get() {
        let table_type = Arc::new(TabularType::map_of(
            "Props",
            OpenType::STRING,
            OpenType::STRING,
        ));
        let mut table = OpenTable::new(table_type.clone());
        let row = OpenRecord::from_values(
            table_type.row_type().clone(),
            vec![OpenValue::from("os.name"), OpenValue::from("linux")],
        )
        .unwrap();
        table.put(row.clone()).unwrap();
        assert!(table.put(row).is_err());
        assert_eq!(table.len(), 1);

        let found = table.get(&[OpenValue::from("os.name")]).unwrap();
        assert_eq!(found.get("value"), Some(&OpenValue::from("linux")));
        assert!(table.get(&[OpenValue::from("missing")]).is_none());
    }
}
