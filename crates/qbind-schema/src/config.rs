/// Controls schema validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryConfig {
    /// When true, queues without a schema return `SchemaError::NoSchema`
    /// instead of passing payloads through unchecked.
    pub fail_on_missing_schema: bool,
}
