//! Plain SQL statements for the SQLite backend.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::{Map, Number, Value};

use super::Query;

/// A row decoded into a JSON object keyed by column name.
pub type JsonRow = Map<String, Value>;

/// Turns one result row into the caller's type.
pub type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

/// SQL text, its bound parameters and a row mapper.
///
/// ```ignore
/// let query = SqlQuery::new("SELECT id, name FROM users WHERE name = ?").bind("ada".to_string());
/// ```
pub struct SqlQuery<T = JsonRow> {
    sql: String,
    params: Vec<SqlValue>,
    mapper: RowMapper<T>,
}

impl SqlQuery<JsonRow> {
    /// A query whose rows come back as JSON objects.
    pub fn new(sql: impl Into<String>) -> Self {
        SqlQuery::mapped(sql, json_row)
    }
}

impl<T> SqlQuery<T> {
    pub fn mapped(sql: impl Into<String>, mapper: RowMapper<T>) -> Self {
        SqlQuery {
            sql: sql.into(),
            params: Vec::new(),
            mapper,
        }
    }

    /// Bind the next positional parameter.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl<T: Send + 'static> Query for SqlQuery<T> {
    type Row = T;

    fn render(&self) -> String {
        render_sql(&self.sql, &self.params)
    }

    fn run(self, conn: &mut Connection) -> rusqlite::Result<Vec<T>> {
        let mut stmt = conn.prepare(&self.sql)?;
        let mut rows = stmt.query(params_from_iter(self.params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((self.mapper)(row)?);
        }
        Ok(out)
    }
}

/// Default mapper: every column becomes a JSON value, blobs as base64 text.
pub fn json_row(row: &Row<'_>) -> rusqlite::Result<JsonRow> {
    let stmt: &rusqlite::Statement<'_> = row.as_ref();
    let mut map = Map::new();
    for i in 0..stmt.column_count() {
        let name = stmt.column_name(i)?.to_string();
        map.insert(name, value_ref_to_json(row.get_ref(i)?));
    }
    Ok(map)
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::from(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(STANDARD.encode(bytes)),
    }
}

/// Render a parameter as a SQL literal.
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// Substitute `?` and `?NNN` placeholders with their bound values, leaving
/// quoted text untouched. Placeholders without a bound value stay as they are.
pub fn render_sql(sql: &str, params: &[SqlValue]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut next_index = 0usize;

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '?') => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                let index = match digits.parse::<usize>() {
                    Ok(n) if n > 0 => n - 1,
                    _ => next_index,
                };
                next_index = index + 1;
                match params.get(index) {
                    Some(value) => out.push_str(&sql_literal(value)),
                    None => {
                        out.push('?');
                        out.push_str(&digits);
                    }
                }
            }
            (None, c) => out.push(c),
        }
    }
    out
}
