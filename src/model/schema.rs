/// Record Schema Module
///
/// Derives the immutable, per-entity mapping from a list of field
/// declarations: table name, primary key, ordered non-key fields and the
/// pre-rendered SQL statements used by every record of the entity.

use crate::core::SchemaError;
use crate::model::field::FieldDescriptor;
use crate::model::record::Record;
use std::sync::Arc;
use tracing::{debug, info};

/// A declared attribute together with the column it maps to
#[derive(Debug, Clone)]
pub struct MappedField {
    attribute: String,
    column: String,
    descriptor: FieldDescriptor,
}

impl MappedField {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }
}

/// Collects field declarations for one entity type.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    entity: String,
    table: Option<String>,
    fields: Vec<(String, FieldDescriptor)>,
}

impl SchemaBuilder {
    /// Overrides the table name; otherwise the entity name is used.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declares attribute `attribute`. Declaration order is preserved.
    pub fn field(mut self, attribute: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push((attribute.into(), descriptor));
        self
    }

    /// Validates the declarations and renders the SQL templates.
    ///
    /// # Errors
    ///
    /// `SchemaError::DuplicatePrimaryKey` or `SchemaError::MissingPrimaryKey`
    /// unless exactly one field is the primary key; `DuplicateField`,
    /// `DuplicateColumn` and `EmptyName` for malformed declarations.
    pub fn build(self) -> Result<Arc<RecordSchema>, SchemaError> {
        let entity = self.entity;
        if entity.trim().is_empty() {
            return Err(SchemaError::EmptyName {
                entity,
                what: "entity name",
            });
        }
        let table = self.table.unwrap_or_else(|| entity.clone());
        if table.trim().is_empty() {
            return Err(SchemaError::EmptyName {
                entity,
                what: "table name",
            });
        }
        info!(model = %entity, table = %table, "found model");

        let mut primary_key: Option<MappedField> = None;
        let mut fields: Vec<MappedField> = Vec::with_capacity(self.fields.len());
        let mut seen: Vec<(&str, &str)> = Vec::with_capacity(self.fields.len());

        for (attribute, descriptor) in &self.fields {
            let column = descriptor.column_name().unwrap_or(attribute.as_str());
            if attribute.trim().is_empty() || column.trim().is_empty() {
                return Err(SchemaError::EmptyName {
                    entity,
                    what: "field name",
                });
            }
            if seen.iter().any(|(a, _)| *a == attribute.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity,
                    field: attribute.clone(),
                });
            }
            if seen.iter().any(|(_, c)| *c == column) {
                return Err(SchemaError::DuplicateColumn {
                    entity,
                    column: column.to_string(),
                });
            }
            seen.push((attribute.as_str(), column));
            debug!(model = %entity, field = %attribute, mapping = %descriptor, "found mapping");

            let mapped = MappedField {
                attribute: attribute.clone(),
                column: column.to_string(),
                descriptor: descriptor.clone(),
            };
            if descriptor.is_primary_key() {
                if let Some(first) = &primary_key {
                    return Err(SchemaError::DuplicatePrimaryKey {
                        entity,
                        first: first.attribute.clone(),
                        second: attribute.clone(),
                    });
                }
                primary_key = Some(mapped);
            } else {
                fields.push(mapped);
            }
        }

        let primary_key = primary_key.ok_or_else(|| SchemaError::MissingPrimaryKey {
            entity: entity.clone(),
        })?;

        Ok(Arc::new(RecordSchema::render(entity, table, primary_key, fields)))
    }
}

/// Derived SQL mapping for one entity type.
///
/// Built once per entity through `RecordSchema::builder` and shared by all of
/// its records. All statements use `?` placeholders; identifiers are
/// backtick-quoted.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    entity: String,
    table: String,
    primary_key: MappedField,
    fields: Vec<MappedField>,
    select: String,
    insert: String,
    update: String,
    delete: String,
    find: String,
    count: String,
}

impl RecordSchema {
    pub fn builder(entity: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            entity: entity.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    fn render(entity: String, table: String, primary_key: MappedField, fields: Vec<MappedField>) -> Self {
        let table_q = quote_identifier(&table);
        let pk_q = quote_identifier(&primary_key.column);
        let columns: Vec<String> = fields.iter().map(|f| quote_identifier(&f.column)).collect();

        let select = if columns.is_empty() {
            format!("select {} from {}", pk_q, table_q)
        } else {
            format!("select {}, {} from {}", pk_q, columns.join(", "), table_q)
        };

        let insert_columns: Vec<&str> = columns.iter().map(String::as_str).chain([pk_q.as_str()]).collect();
        let insert = format!(
            "insert into {} ({}) values ({})",
            table_q,
            insert_columns.join(", "),
            placeholders(insert_columns.len())
        );

        // a key-only entity still needs a well-formed set clause
        let assignments = if columns.is_empty() {
            format!("{}={}", pk_q, pk_q)
        } else {
            columns.iter().map(|c| format!("{}=?", c)).collect::<Vec<_>>().join(", ")
        };
        let update = format!("update {} set {} where {}=?", table_q, assignments, pk_q);
        let delete = format!("delete from {} where {}=?", table_q, pk_q);
        let find = format!("{} where {}=?", select, pk_q);
        let count = format!("select count({}) as `_num_` from {}", pk_q, table_q);

        RecordSchema {
            entity,
            table,
            primary_key,
            fields,
            select,
            insert,
            update,
            delete,
            find,
            count,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &MappedField {
        &self.primary_key
    }

    pub fn primary_key_column(&self) -> &str {
        self.primary_key.column()
    }

    /// Non-key fields in declaration order.
    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// Looks a field up by attribute name, primary key included.
    pub fn field(&self, attribute: &str) -> Option<&MappedField> {
        std::iter::once(&self.primary_key)
            .chain(self.fields.iter())
            .find(|f| f.attribute == attribute)
    }

    pub fn column_of(&self, attribute: &str) -> Option<&str> {
        self.field(attribute).map(MappedField::column)
    }

    /// Maps a result column back to its attribute name.
    pub fn attribute_of(&self, column: &str) -> Option<&str> {
        std::iter::once(&self.primary_key)
            .chain(self.fields.iter())
            .find(|f| f.column == column)
            .map(MappedField::attribute)
    }

    /// `select <pk>, <columns...> from <table>`
    pub fn select_sql(&self) -> &str {
        &self.select
    }

    /// `insert into <table> (<columns...>, <pk>) values (?, ...)`
    pub fn insert_sql(&self) -> &str {
        &self.insert
    }

    /// `update <table> set <col>=?, ... where <pk>=?`
    pub fn update_sql(&self) -> &str {
        &self.update
    }

    /// `delete from <table> where <pk>=?`
    pub fn delete_sql(&self) -> &str {
        &self.delete
    }

    /// The select statement filtered on the primary key.
    pub fn find_sql(&self) -> &str {
        &self.find
    }

    /// Counts rows into a column named `_num_`.
    pub fn count_sql(&self) -> &str {
        &self.count
    }

    /// An empty record of this entity.
    pub fn record(self: &Arc<Self>) -> Record {
        Record::new(self.clone())
    }
}

/// A Rust type with a registered record schema.
///
/// Implementors typically keep the schema in a `once_cell::sync::Lazy` so the
/// derivation runs exactly once:
///
/// ```
/// use once_cell::sync::Lazy;
/// use rowmap::{Entity, FieldDescriptor, RecordSchema};
/// use std::sync::Arc;
///
/// struct User;
///
/// static USER: Lazy<Arc<RecordSchema>> = Lazy::new(|| {
///     RecordSchema::builder("User")
///         .table("users")
///         .field("id", FieldDescriptor::integer().primary_key())
///         .field("name", FieldDescriptor::string())
///         .build()
///         .expect("valid User declaration")
/// });
///
/// impl Entity for User {
///     fn schema() -> Arc<RecordSchema> {
///         USER.clone()
///     }
/// }
///
/// assert_eq!(User::schema().select_sql(), "select `id`, `name` from `users`");
/// ```
pub trait Entity {
    fn schema() -> Arc<RecordSchema>;

    fn record() -> Record {
        Record::new(Self::schema())
    }
}

/// Backtick-quotes an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    fn user_schema() -> Arc<RecordSchema> {
        RecordSchema::builder("User")
            .table("users")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("name", FieldDescriptor::string())
            .field("email", FieldDescriptor::string().name("email_address"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_rendered_templates() {
        let schema = user_schema();
        assert_snapshot!(schema.select_sql(), @"select `id`, `name`, `email_address` from `users`");
        assert_snapshot!(schema.insert_sql(), @"insert into `users` (`name`, `email_address`, `id`) values (?, ?, ?)");
        assert_snapshot!(schema.update_sql(), @"update `users` set `name`=?, `email_address`=? where `id`=?");
        assert_snapshot!(schema.delete_sql(), @"delete from `users` where `id`=?");
        assert_snapshot!(schema.find_sql(), @"select `id`, `name`, `email_address` from `users` where `id`=?");
        assert_snapshot!(schema.count_sql(), @"select count(`id`) as `_num_` from `users`");
    }

    #[test]
    fn test_partition_and_lookup() {
        let schema = user_schema();
        assert_eq!(schema.entity(), "User");
        assert_eq!(schema.table(), "users");
        assert_eq!(schema.primary_key().attribute(), "id");
        assert_eq!(schema.primary_key_column(), "id");
        let names: Vec<&str> = schema.fields().iter().map(MappedField::attribute).collect();
        assert_eq!(names, vec!["name", "email"]);

        assert_eq!(schema.column_of("email"), Some("email_address"));
        assert_eq!(schema.column_of("id"), Some("id"));
        assert_eq!(schema.attribute_of("email_address"), Some("email"));
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_table_defaults_to_entity_name() {
        let schema = RecordSchema::builder("Blog")
            .field("id", FieldDescriptor::string().primary_key())
            .build()
            .unwrap();
        assert_eq!(schema.table(), "Blog");
        assert_eq!(schema.select_sql(), "select `id` from `Blog`");
        assert_eq!(schema.insert_sql(), "insert into `Blog` (`id`) values (?)");
        assert_eq!(schema.update_sql(), "update `Blog` set `id`=`id` where `id`=?");
    }

    #[test]
    fn test_renamed_primary_key_column() {
        let schema = RecordSchema::builder("Account")
            .field("uid", FieldDescriptor::integer().primary_key().name("account_id"))
            .build()
            .unwrap();
        assert_eq!(schema.primary_key().attribute(), "uid");
        assert_eq!(schema.primary_key_column(), "account_id");
        assert_eq!(schema.delete_sql(), "delete from `Account` where `account_id`=?");
    }

    #[test]
    fn test_reserved_words_are_quoted() {
        let schema = RecordSchema::builder("Order")
            .table("order")
            .field("key", FieldDescriptor::string().primary_key())
            .field("group", FieldDescriptor::string())
            .field("odd", FieldDescriptor::string().name("we`ird"))
            .build()
            .unwrap();
        assert_eq!(schema.delete_sql(), "delete from `order` where `key`=?");
        assert_eq!(schema.select_sql(), "select `key`, `group`, `we``ird` from `order`");
    }

    #[test]
    fn test_duplicate_primary_key() {
        let err = RecordSchema::builder("User")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("uuid", FieldDescriptor::string().primary_key())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicatePrimaryKey {
                entity: "User".to_string(),
                first: "id".to_string(),
                second: "uuid".to_string(),
            }
        );
        assert!(err.to_string().contains("duplicate primary key"));
    }

    #[test]
    fn test_missing_primary_key() {
        let err = RecordSchema::builder("User")
            .field("name", FieldDescriptor::string())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingPrimaryKey { .. }));
        assert!(err.to_string().contains("missing primary key"));
    }

    #[test]
    fn test_malformed_declarations() {
        let dup_field = RecordSchema::builder("T")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("a", FieldDescriptor::string())
            .field("a", FieldDescriptor::text())
            .build();
        assert!(matches!(dup_field, Err(SchemaError::DuplicateField { .. })));

        let dup_column = RecordSchema::builder("T")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("a", FieldDescriptor::string())
            .field("b", FieldDescriptor::string().name("a"))
            .build();
        assert!(matches!(dup_column, Err(SchemaError::DuplicateColumn { .. })));

        let empty = RecordSchema::builder("T").table("").build();
        assert!(matches!(empty, Err(SchemaError::EmptyName { what: "table name", .. })));
    }

    #[test]
    fn test_templates_prepare_against_sqlite() {
        let schema = user_schema();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "create table users (id bigint primary key, name varchar(100), email_address varchar(100))",
        )
        .unwrap();
        for sql in [
            schema.select_sql(),
            schema.insert_sql(),
            schema.update_sql(),
            schema.delete_sql(),
            schema.find_sql(),
            schema.count_sql(),
        ] {
            let native = crate::core::db::translate_placeholders(sql);
            conn.prepare(&native).unwrap();
        }
    }
}
