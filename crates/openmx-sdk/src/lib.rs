//! OpenMX SDK - open types, open values and native conversion
//!
//! This crate holds everything that crosses the management boundary
//! without depending on the engine: the open type system, wire-safe
//! values, structured object names, the [`OpenMapped`] conversion trait
//! and the error type shared by every management call.
//!
//! # Example
//!
//! ```ignore
//! use openmx_sdk::{OpenMapped, OpenValue};
//!
//! let ids = vec![1i64, 2, 3];
//! let open = ids.to_open();
//! assert!(open.conforms_to(&Vec::<i64>::open_type()));
//! assert_eq!(Vec::<i64>::from_open(&open).unwrap(), ids);
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod object_name;
pub mod open_type;
pub mod schema;
pub mod value;

pub use convert::{
    from_open, map_table_type, native_type_name, record_value, to_open, OpenArgs, OpenEnum,
    OpenMapped, RecordReader,
};
pub use error::{MgmtError, MgmtResult, Severity};
pub use object_name::ObjectName;
pub use open_type::{CompositeItem, CompositeType, CompositeTypeBuilder, OpenType, SimpleType, TabularType};
pub use schema::{schemas, SchemaCache};
pub use value::{OpenRecord, OpenTable, OpenValue};
