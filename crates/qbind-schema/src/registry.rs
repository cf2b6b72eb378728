use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::validate_payload;

/// Queue-keyed registry of compiled JSON Schema validators.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            validators: HashMap::new(),
            config,
        }
    }

    /// Register a schema for a queue from a JSON string.
    pub fn register(&mut self, queue: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(queue, &schema)
    }

    /// Register a schema for a queue from a JSON value.
    pub fn register_value(&mut self, queue: &str, schema: &Value) -> Result<()> {
        let compiled = jsonschema::validator_for(schema)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;
        debug!(queue, "compiled schema validator");
        self.validators.insert(queue.to_string(), compiled);
        Ok(())
    }

    /// Load from embedded schema strings.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (queue, schema) in schemas {
            registry.register(queue, schema)?;
        }
        Ok(registry)
    }

    /// Validate a queue payload against its schema.
    pub fn validate(&self, queue: &str, payload: &[u8]) -> Result<()> {
        match self.validators.get(queue) {
            Some(validator) => validate_payload(queue, payload, validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(queue.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Check if a queue has a registered schema.
    pub fn has_schema(&self, queue: &str) -> bool {
        self.validators.contains_key(queue)
    }

    /// Get queues that have registered schemas.
    pub fn queues(&self) -> Vec<&str> {
        let mut queues: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        queues.sort_unstable();
        queues
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "first": { "type": "string" },
            "last": { "type": "string" }
        },
        "required": ["first", "last"]
    }"#;

    #[test]
    fn register_and_validate() {
        let mut registry = SchemaRegistry::new();
        registry.register("person", PERSON_SCHEMA).unwrap();

        assert!(registry
            .validate("person", br#"{"first":"John","last":"Doe"}"#)
            .is_ok());
        assert!(matches!(
            registry.validate("person", br#"{"first":1,"last":"Doe"}"#),
            Err(SchemaError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn multiple_queues_independent_validation() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "counts",
                r#"{"type":"object","properties":{"n":{"type":"integer"}},"required":["n"]}"#,
            )
            .unwrap();
        registry
            .register("flags", r#"{"type":"array","items":{"type":"boolean"}}"#)
            .unwrap();

        assert!(registry.validate("counts", br#"{"n":7}"#).is_ok());
        assert!(registry.validate("flags", br#"[true,false]"#).is_ok());

        assert!(registry.validate("counts", br#"{"n":"x"}"#).is_err());
        assert!(registry.validate("flags", br#"[true,1]"#).is_err());
    }

    #[test]
    fn missing_schema_permissive_passes() {
        let registry = SchemaRegistry::new();
        assert!(registry.validate("anything", br#"{"any":"thing"}"#).is_ok());
    }

    #[test]
    fn missing_schema_strict_fails() {
        let registry = SchemaRegistry::with_config(RegistryConfig {
            fail_on_missing_schema: true,
        });

        assert!(matches!(
            registry.validate("anything", br#"{}"#),
            Err(SchemaError::NoSchema(_))
        ));
    }

    #[test]
    fn invalid_json_payload_fails() {
        let mut registry = SchemaRegistry::new();
        registry.register("person", PERSON_SCHEMA).unwrap();

        assert!(matches!(
            registry.validate("person", b"not-json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut registry = SchemaRegistry::new();
        let invalid = r#"{"type":"definitely-not-a-type"}"#;

        assert!(matches!(
            registry.register("person", invalid),
            Err(SchemaError::CompileFailed(_))
        ));
    }

    #[test]
    fn from_embedded_loads_schemas() {
        let registry = SchemaRegistry::from_embedded(&[
            ("person", PERSON_SCHEMA),
            (
                "toggles",
                r#"{"type":"object","properties":{"x":{"type":"boolean"}},"required":["x"]}"#,
            ),
        ])
        .unwrap();

        assert!(registry.has_schema("person"));
        assert!(registry.has_schema("toggles"));
        assert_eq!(registry.queues(), vec!["person", "toggles"]);
    }
}
