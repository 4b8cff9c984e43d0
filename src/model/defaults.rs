//! Ready-made default suppliers for `FieldDescriptor::default_with`.

use crate::core::db::Value;
use chrono::Utc;
use uuid::Uuid;

/// A 50-character id: 15-digit millisecond timestamp, uuid-v4 hex, `000`.
///
/// Ids generated later sort after earlier ones.
pub fn unique_id() -> Value {
    Value::Text(format!(
        "{:015}{}000",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    ))
}

/// Seconds since the Unix epoch, with millisecond precision.
pub fn unix_timestamp() -> Value {
    Value::Real(Utc::now().timestamp_millis() as f64 / 1000.0)
}
