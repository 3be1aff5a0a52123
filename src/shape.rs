//! Response shapes and their wire form.
//!
//! A run declares the structure it expects back either as a literal JSON
//! example or as a JSON Schema. Literal values travel unchanged; schemas are
//! wrapped into a named document whose root is a `$ref` to
//! `#/definitions/responseObject`.

use schemars::{schema::RootSchema, JsonSchema};
use serde_json::{json, Map, Value};

use crate::errors::{Error, Result};

/// Definition name the translated schema is registered under.
pub const RESPONSE_SCHEMA_NAME: &str = "responseObject";

const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Expected structure of a run's result.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseShape {
    /// Literal JSON example, sent as-is.
    Json(Value),
    /// Structured schema, translated to a named JSON Schema document.
    Schema(RootSchema),
}

impl ResponseShape {
    /// Schema shape derived from a Rust type.
    pub fn from_type<T: JsonSchema>() -> Self {
        ResponseShape::Schema(schemars::schema_for!(T))
    }

    /// Value placed in the request body's `responseObject` field.
    pub fn to_wire(&self) -> Result<Value> {
        match self {
            ResponseShape::Json(value) => Ok(value.clone()),
            ResponseShape::Schema(root) => {
                let mut definitions = Map::new();
                for (name, schema) in &root.definitions {
                    definitions.insert(
                        name.clone(),
                        serde_json::to_value(schema).map_err(Error::Serialization)?,
                    );
                }
                definitions.insert(
                    RESPONSE_SCHEMA_NAME.to_string(),
                    serde_json::to_value(&root.schema).map_err(Error::Serialization)?,
                );
                let meta = root.meta_schema.as_deref().unwrap_or(DRAFT_07);
                Ok(json!({
                    "$ref": format!("#/definitions/{RESPONSE_SCHEMA_NAME}"),
                    "definitions": definitions,
                    "$schema": meta,
                }))
            }
        }
    }
}

impl From<Value> for ResponseShape {
    fn from(value: Value) -> Self {
        ResponseShape::Json(value)
    }
}

impl From<RootSchema> for ResponseShape {
    fn from(schema: RootSchema) -> Self {
        ResponseShape::Schema(schema)
    }
}
