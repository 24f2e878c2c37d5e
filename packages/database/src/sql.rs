//! Incremental builder for raw SQL with positional `$n` parameters.

use switchy_database::DatabaseValue;

/// Accumulates SQL text and its bound parameters.
///
/// Every [`SqlBuilder::bind`] call pushes a value and returns the matching
/// `$n` placeholder, so clauses can be appended without tracking indices.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<DatabaseValue>,
}

impl SqlBuilder {
    /// Starts a builder from a base statement.
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            sql: base.to_string(),
            params: Vec::new(),
        }
    }

    /// Binds a value and returns its placeholder.
    pub fn bind(&mut self, value: DatabaseValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Appends raw SQL text.
    pub fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Appends ` AND <column> <op> $n` with the value bound.
    pub fn and(&mut self, column: &str, op: &str, value: DatabaseValue) {
        let placeholder = self.bind(value);
        self.sql.push_str(" AND ");
        self.sql.push_str(column);
        self.sql.push(' ');
        self.sql.push_str(op);
        self.sql.push(' ');
        self.sql.push_str(&placeholder);
    }

    /// Returns the SQL text built so far.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters.
    #[must_use]
    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }

    /// Consumes the builder.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<DatabaseValue>) {
        (self.sql, self.params)
    }
}

/// Wraps an optional string as a nullable parameter.
#[must_use]
pub fn opt_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.to_string()))
}

/// Wraps an optional `i64` as a nullable parameter.
#[must_use]
pub fn opt_i64(value: Option<i64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Int64)
}

/// Wraps an optional `i32` as a nullable parameter.
#[must_use]
pub fn opt_i32(value: Option<i32>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Int32)
}

/// Wraps an optional `bool` as a nullable parameter.
#[must_use]
pub fn opt_bool(value: Option<bool>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Bool)
}

/// Converts a naive UTC timestamp read from the database.
#[must_use]
pub fn utc(naive: chrono::NaiveDateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(naive, chrono::Utc)
}
