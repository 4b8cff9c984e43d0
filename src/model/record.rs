//! Records: live entity instances and their persistence operations.

use crate::core::db::{Executor, Row, Value};
use crate::core::{OrmError, Result};
use crate::model::schema::RecordSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One instance of an entity: attribute names mapped to values.
///
/// Every record shares its entity's `RecordSchema`. Attributes that were never
/// set are simply absent; `value_or_default` fills them in from the field
/// declaration when a value is needed.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: HashMap<String, Value>,
}

impl Record {
    /// An empty record.
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Record {
            schema,
            values: HashMap::new(),
        }
    }

    /// Builds a record from a result row, translating column names back to
    /// attribute names. Columns the schema does not know are kept under
    /// their own name.
    pub fn from_row(schema: Arc<RecordSchema>, row: Row) -> Self {
        let values = row
            .into_iter()
            .map(|(column, value)| {
                let key = schema.attribute_of(&column).map(str::to_string).unwrap_or(column);
                (key, value)
            })
            .collect();
        Record { schema, values }
    }

    /// Sets `attribute` and returns the record, for building instances inline.
    pub fn with(mut self, attribute: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(attribute, value)?;
        Ok(self)
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// The stored value of `attribute`, without default substitution.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// The stored value of `attribute`, NULL when nothing is stored.
    pub fn value(&self, attribute: &str) -> Value {
        self.values.get(attribute).cloned().unwrap_or_default()
    }

    /// The stored value converted to `T`; `None` when absent or NULL.
    pub fn get_as<T>(&self, attribute: &str) -> Result<Option<T>>
    where
        T: TryFrom<Value, Error = OrmError>,
    {
        match self.values.get(attribute) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::try_from(value.clone()).map(Some),
        }
    }

    /// Stores a value for a declared attribute.
    ///
    /// # Errors
    ///
    /// `OrmError::UnknownField` if the schema has no such attribute.
    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        self.require_field(attribute)?;
        self.values.insert(attribute.to_string(), value.into());
        Ok(())
    }

    /// The stored value, or the field's default if nothing (or NULL) is stored.
    ///
    /// A resolved default is written back onto the record, so a supplier runs
    /// at most once per attribute and repeated calls return the same value.
    pub fn value_or_default(&mut self, attribute: &str) -> Result<Value> {
        if let Some(value) = self.values.get(attribute).filter(|v| !v.is_null()) {
            return Ok(value.clone());
        }
        let default = self.require_field(attribute)?.descriptor().default().cloned();
        match default {
            Some(default) => {
                let value = default.resolve();
                debug!(field = %attribute, value = %value, "using default value");
                self.values.insert(attribute.to_string(), value.clone());
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    /// The stored primary key value.
    pub fn primary_key_value(&self) -> Option<&Value> {
        self.values.get(self.schema.primary_key().attribute())
    }

    /// Declared attributes in schema order, as a JSON object.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        let declared = std::iter::once(self.schema.primary_key()).chain(self.schema.fields());
        for field in declared {
            let value = self.value(field.attribute());
            object.insert(field.attribute().to_string(), serde_json::to_value(value)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    fn require_field(&self, attribute: &str) -> Result<&crate::model::schema::MappedField> {
        self.schema.field(attribute).ok_or_else(|| OrmError::UnknownField {
            entity: self.schema.entity().to_string(),
            field: attribute.to_string(),
        })
    }

    /// Looks up one record by primary key.
    pub async fn find(
        executor: &Executor,
        schema: &Arc<RecordSchema>,
        primary_key: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let rows = executor
            .query(schema.find_sql(), &[primary_key.into()], Some(1))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| Record::from_row(schema.clone(), row)))
    }

    /// Every row of the entity's table, in the order the database returns them.
    pub async fn find_all(executor: &Executor, schema: &Arc<RecordSchema>) -> Result<Vec<Record>> {
        let rows = executor.query(schema.select_sql(), &[], None).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(schema.clone(), row))
            .collect())
    }

    /// Number of rows in the entity's table.
    pub async fn count(executor: &Executor, schema: &Arc<RecordSchema>) -> Result<i64> {
        let rows = executor.query(schema.count_sql(), &[], Some(1)).await?;
        match rows.first().and_then(|row| row.get("_num_")) {
            Some(value) => i64::try_from(value.clone()),
            None => Ok(0),
        }
    }

    /// Inserts the record, resolving defaults for unset fields.
    ///
    /// # Errors
    ///
    /// Statement errors propagate unchanged. An insert that does not affect
    /// exactly one row fails with `OrmError::UnexpectedRowCount`.
    pub async fn save(&mut self, executor: &Executor) -> Result<()> {
        let schema = self.schema.clone();
        let mut args = Vec::with_capacity(schema.fields().len() + 1);
        for field in schema.fields() {
            args.push(self.value_or_default(field.attribute())?);
        }
        args.push(self.value_or_default(schema.primary_key().attribute())?);

        let rows = executor.execute(schema.insert_sql(), &args).await?;
        if rows != 1 {
            warn!(model = %schema.entity(), affected = rows, "failed to insert record");
            return Err(OrmError::UnexpectedRowCount {
                expected: 1,
                actual: rows,
            });
        }
        Ok(())
    }

    /// Writes the stored non-key values to the row with this record's key.
    ///
    /// Unset fields are written as NULL; defaults are not applied. Returns
    /// the affected row count, where 0 means no row has this key.
    pub async fn update(&self, executor: &Executor) -> Result<u64> {
        let mut args: Vec<Value> = self
            .schema
            .fields()
            .iter()
            .map(|f| self.value(f.attribute()))
            .collect();
        args.push(self.primary_key_value().cloned().unwrap_or_default());

        let rows = executor.execute(self.schema.update_sql(), &args).await?;
        if rows == 0 {
            warn!(model = %self.schema.entity(), "failed to update record: no matching row");
        }
        Ok(rows)
    }

    /// Deletes the row with this record's key, returning the affected row count.
    pub async fn remove(&self, executor: &Executor) -> Result<u64> {
        let args = [self.primary_key_value().cloned().unwrap_or_default()];
        let rows = executor.execute(self.schema.delete_sql(), &args).await?;
        if rows == 0 {
            warn!(model = %self.schema.entity(), "failed to remove record: no matching row");
        }
        Ok(rows)
    }
}
