//! Open types: self-describing descriptions of wire-safe values
//!
//! An open type is the schema half of an open value. Simple types cover
//! primitives and strings; arrays nest any open type; composite types are
//! fixed, ordered field lists; tabular types are tables of composite rows.
//!
//! Schemas are compared structurally: two composite types are equal when
//! their type names, field names and field types match. Descriptions are
//! informational and never take part in equality.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Simple Types
// ============================================================================

/// Leaf open types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    /// No value (operation return type only)
    Void,
    /// `boolean`
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// UTF-8 string
    String,
    /// Structured object name (`domain:key=value,...`)
    ObjectName,
}

impl SimpleType {
    /// Wire name of this type, as used in operation signatures
    pub const fn type_name(&self) -> &'static str {
        match self {
            SimpleType::Void => "void",
            SimpleType::Boolean => "boolean",
            SimpleType::Int => "int",
            SimpleType::Long => "long",
            SimpleType::Double => "double",
            SimpleType::String => "string",
            SimpleType::ObjectName => "objectname",
        }
    }

    /// True for types whose native counterpart has no null
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            SimpleType::Boolean | SimpleType::Int | SimpleType::Long | SimpleType::Double
        )
    }
}

// ============================================================================
// Open Type
// ============================================================================

/// Schema of an open value
#[derive(Debug, Clone, PartialEq)]
pub enum OpenType {
    /// Primitive or string
    Simple(SimpleType),
    /// Array of a single element type
    Array(Box<OpenType>),
    /// Fixed record
    Composite(Arc<CompositeType>),
    /// Table of records
    Tabular(Arc<TabularType>),
}

impl OpenType {
    /// `void`
    pub const VOID: OpenType = OpenType::Simple(SimpleType::Void);
    /// `boolean`
    pub const BOOLEAN: OpenType = OpenType::Simple(SimpleType::Boolean);
    /// `int`
    pub const INT: OpenType = OpenType::Simple(SimpleType::Int);
    /// `long`
    pub const LONG: OpenType = OpenType::Simple(SimpleType::Long);
    /// `double`
    pub const DOUBLE: OpenType = OpenType::Simple(SimpleType::Double);
    /// `string`
    pub const STRING: OpenType = OpenType::Simple(SimpleType::String);
    /// `objectname`
    pub const OBJECT_NAME: OpenType = OpenType::Simple(SimpleType::ObjectName);

    /// Array of `element`
    pub fn array_of(element: OpenType) -> Self {
        OpenType::Array(Box::new(element))
    }

    /// Signature name of this type (`long`, `string[]`, `MemoryUsage`, ...)
    pub fn type_name(&self) -> String {
        match self {
            OpenType::Simple(simple) => simple.type_name().to_string(),
            OpenType::Array(element) => format!("{}[]", element.type_name()),
            OpenType::Composite(composite) => composite.type_name().to_string(),
            OpenType::Tabular(tabular) => tabular.type_name().to_string(),
        }
    }

    /// True for simple (non-composite, non-tabular, non-array) types
    pub fn is_simple(&self) -> bool {
        matches!(self, OpenType::Simple(_))
    }

    /// True for simple types without a null value
    pub fn is_primitive(&self) -> bool {
        match self {
            OpenType::Simple(simple) => simple.is_primitive(),
            _ => false,
        }
    }

    /// Composite schema, if this is a composite type
    pub fn as_composite(&self) -> Option<&Arc<CompositeType>> {
        match self {
            OpenType::Composite(composite) => Some(composite),
            _ => None,
        }
    }

    /// Tabular schema, if this is a tabular type
    pub fn as_tabular(&self) -> Option<&Arc<TabularType>> {
        match self {
            OpenType::Tabular(tabular) => Some(tabular),
            _ => None,
        }
    }
}

impl fmt::Display for OpenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

// ============================================================================
// Composite Type
// ============================================================================

/// One named field of a composite type
#[derive(Debug, Clone)]
pub struct CompositeItem {
    /// Field name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Field type
    pub open_type: OpenType,
}

/// Fixed, ordered record schema
#[derive(Debug, Clone)]
pub struct CompositeType {
    type_name: String,
    description: String,
    items: Vec<CompositeItem>,
    index: FxHashMap<String, usize>,
}

impl CompositeType {
    /// Start building a composite type
    pub fn builder(type_name: impl Into<String>) -> CompositeTypeBuilder {
        CompositeTypeBuilder {
            type_name: type_name.into(),
            description: String::new(),
            items: Vec::new(),
        }
    }

    /// Name of the record kind
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Description of the record kind
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Fields in declaration order
    pub fn items(&self) -> &[CompositeItem] {
        &self.items
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    /// Position of a field
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Field by name
    pub fn item(&self, name: &str) -> Option<&CompositeItem> {
        self.index_of(name).map(|idx| &self.items[idx])
    }

    /// Type of a field
    pub fn field_type(&self, name: &str) -> Option<&OpenType> {
        self.item(name).map(|item| &item.open_type)
    }

    /// True if the schema declares a field with this name
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

impl PartialEq for CompositeType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.name == b.name && a.open_type == b.open_type)
    }
}

/// Builder for [`CompositeType`]
pub struct CompositeTypeBuilder {
    type_name: String,
    description: String,
    items: Vec<CompositeItem>,
}

impl CompositeTypeBuilder {
    /// Set the record description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a field; a repeated name keeps the first declaration
    pub fn field(mut self, name: &str, open_type: OpenType) -> Self {
        if self.items.iter().any(|item| item.name == name) {
            debug_assert!(false, "duplicate field `{}` in {}", name, self.type_name);
            return self;
        }
        self.items.push(CompositeItem {
            name: name.to_string(),
            description: name.to_string(),
            open_type,
        });
        self
    }

    /// Finish the schema
    pub fn build(self) -> CompositeType {
        let index = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.name.clone(), idx))
            .collect();
        CompositeType {
            type_name: self.type_name,
            description: self.description,
            items: self.items,
            index,
        }
    }
}

// ============================================================================
// Tabular Type
// ============================================================================

/// Table schema: a row composite type plus the index columns
#[derive(Debug, Clone, PartialEq)]
pub struct TabularType {
    type_name: String,
    row_type: Arc<CompositeType>,
    index_names: Vec<String>,
}

impl TabularType {
    /// Create a table type from a row type and its index column names
    pub fn new(
        type_name: impl Into<String>,
        row_type: Arc<CompositeType>,
        index_names: Vec<String>,
    ) -> Self {
        TabularType {
            type_name: type_name.into(),
            row_type,
            index_names,
        }
    }

    /// Two-column `(key, value)` table indexed by `key`
    pub fn map_of(type_name: impl Into<String>, key: OpenType, value: OpenType) -> Self {
        let type_name = type_name.into();
        let row_type = CompositeType::builder(format!("{}.Entry", type_name))
            .description("Map entry")
            .field("key", key)
            .field("value", value)
            .build();
        TabularType::new(type_name, Arc::new(row_type), vec!["key".to_string()])
    }

    /// Name of the table kind
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Schema of every row
    pub fn row_type(&self) -> &Arc<CompositeType> {
        &self.row_type
    }

    /// Columns that identify a row
    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    /// True for the two-column `(key, value)` shape used for maps
    pub fn is_key_value(&self) -> bool {
        self.row_type.len() == 2 && self.row_type.contains("key") && self.row_type.contains("value")
    }
}
