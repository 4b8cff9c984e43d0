/// Model Module
///
/// The declarative mapping engine: field declarations (`field.rs`), the
/// per-entity schema derived from them (`schema.rs`) and the records that
/// are persisted through it (`record.rs`).
pub mod defaults;
pub mod field;
pub mod record;
pub mod schema;

pub use field::{DefaultSupplier, DefaultValue, FieldDescriptor, FieldKind};
pub use record::Record;
pub use schema::{quote_identifier, Entity, MappedField, RecordSchema, SchemaBuilder};
