use std::fmt;

use tracing::debug;

use super::shape_results;
use crate::error::{JsonMapError, Result};
use crate::value::DecodedValue;

/// A compiled JSONPath expression.
pub struct JsonPath {
    source: String,
    compiled: serde_json_path::JsonPath,
}

impl fmt::Debug for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonPath").field("source", &self.source).finish()
    }
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self> {
        let compiled = serde_json_path::JsonPath::parse(source.trim())
            .map_err(|err| JsonMapError::query(source, err))?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// All matched nodes in document order.
    pub fn select(&self, root: &DecodedValue) -> Vec<DecodedValue> {
        let document = serde_json::Value::from(root);
        self.compiled
            .query(&document)
            .all()
            .into_iter()
            .map(DecodedValue::from)
            .collect()
    }
}

pub fn run_jsonpath(path: &str, input: &DecodedValue) -> Result<DecodedValue> {
    let compiled = JsonPath::parse(path)?;
    let matches = compiled.select(input);
    debug!(path, results = matches.len(), "jsonpath evaluated");
    Ok(shape_results(matches))
}
