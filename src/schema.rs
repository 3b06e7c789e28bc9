//! Module implement table schemas, an ordered list of named, typed columns.
//!
//! Column order is significant, it fixes the on-disk layout of chunk
//! payloads and the serialization order of dictionaries. Schemas are
//! persisted as JSON inside the `.ndts` header, keeping files
//! self-describing.

use serde::{Deserialize, Serialize};

use std::{fmt, result};

use crate::{value::ColumnType, Error, Result};

/// One column of a schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

impl Field {
    pub fn new(name: &str, kind: ColumnType) -> Field {
        Field { name: name.to_string(), kind }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

/// Ordered list of [Field], names unique within the schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Schema> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                err_at!(InvalidInput, msg: "duplicate column {}", field.name)?;
            }
        }
        if fields.is_empty() {
            err_at!(InvalidInput, msg: "schema must have at least one column")?;
        }

        Ok(Schema { fields })
    }

    /// Build a schema from `(name, type)` pairs, in column order.
    pub fn from_spec(spec: &[(&str, ColumnType)]) -> Result<Schema> {
        let fields = spec.iter().map(|(n, t)| Field::new(n, *t)).collect();
        Schema::new(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column position by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Positions of string columns, in column order.
    pub fn string_columns(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == ColumnType::Str)
            .map(|(i, _)| i)
            .collect()
    }

    /// Compatibility means same column names, same types, same order.
    pub fn check_compatible(&self, other: &Schema) -> Result<()> {
        if self.fields.len() != other.fields.len() {
            err_at!(
                SchemaMismatch, msg: "column count {} != {}",
                self.fields.len(), other.fields.len()
            )?;
        }
        for (a, b) in self.fields.iter().zip(other.fields.iter()) {
            if a != b {
                err_at!(SchemaMismatch, msg: "column {} != {}", a, b)?;
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        err_at!(FailConvert, serde_json::to_string(self))
    }

    pub fn from_json(text: &str) -> Result<Schema> {
        let schema: Schema = err_at!(FailConvert, serde_json::from_str(text))?;
        Schema::new(schema.fields)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        let parts: Vec<String> = self.fields.iter().map(|x| x.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod schema_test;
