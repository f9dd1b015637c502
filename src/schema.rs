// src/schema.rs

use jsonschema::Validator;
use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::error::{FlowError, ValidationStage};

/// A named, compiled shape contract.
///
/// Built once at startup from a `schemars`-derived schema (or a raw schema
/// document) and applied at the two checkpoints of every flow: the caller's
/// input before templating, and the model's structured output before it is
/// handed back. Validation is all-or-nothing; no coerced or partial values
/// are ever produced.
pub struct ShapeContract {
    name: String,
    schema: Value,
    compiled: Validator,
}

impl ShapeContract {
    /// Derive the contract from a Rust type's `JsonSchema` impl.
    pub fn of<T: JsonSchema>(name: &str) -> Result<Self, FlowError> {
        let schema = serde_json::to_value(schema_for!(T))
            .map_err(|e| FlowError::input_validation(format!("schema for `{name}`: {e}")))?;
        Self::from_schema(name, schema)
    }

    /// Build the contract from a raw JSON-schema document.
    pub fn from_schema(name: &str, schema: Value) -> Result<Self, FlowError> {
        let compiled = jsonschema::validator_for(&schema).map_err(|e| {
            FlowError::input_validation(format!("schema for `{name}` does not compile: {e}"))
        })?;
        Ok(Self {
            name: name.to_string(),
            schema,
            compiled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw schema document, e.g. for passing to a provider as a
    /// response-schema hint.
    pub fn schema_json(&self) -> &Value {
        &self.schema
    }

    /// Validate a caller-supplied value. Failure is a caller error; no
    /// provider call should be made after it.
    pub fn validate_input(&self, value: &Value) -> Result<(), FlowError> {
        self.check(value, ValidationStage::Input)
    }

    /// Validate a provider-produced value. Failure is a provider contract
    /// violation, surfaced distinctly from caller errors.
    pub fn validate_output(&self, value: &Value) -> Result<(), FlowError> {
        self.check(value, ValidationStage::Output)
    }

    fn check(&self, value: &Value, stage: ValidationStage) -> Result<(), FlowError> {
        let errors: Vec<String> = self
            .compiled
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Validation {
                stage,
                detail: format!("`{}`: {}", self.name, errors.join("; ")),
            })
        }
    }
}

impl std::fmt::Debug for ShapeContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeContract")
            .field("name", &self.name)
            .finish()
    }
}
