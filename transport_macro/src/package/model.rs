//! Model descriptor: the fields, parameters and precomputed tensors a
//! template is expanded against

use crate::config::compile_time::tokenizer::{MAX_INDICES_PER_MACRO, MAX_MACRO_NAME_LENGTH};
use crate::index::{IndexClass, IndexRanges};
use crate::log_success;
use crate::logging::codes;
use crate::rules::UnrollBehaviour;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Cannot read model file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid model description: {message}")]
    Parse { message: String },

    #[error("Model '{model}' is invalid: {message}")]
    Validation { model: String, message: String },
}

impl ModelError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ModelError::Io { .. } => codes::file_processing::IO_ERROR,
            ModelError::Parse { .. } => codes::model::MODEL_PARSE_ERROR,
            ModelError::Validation { .. } => codes::model::MODEL_VALIDATION_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default = "default_model_class")]
    pub class: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_model_class() -> String {
    "canonical".to_string()
}

/// A field or parameter declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub latex: Option<String>,
}

impl Symbol {
    pub fn latex_or_name(&self) -> &str {
        self.latex.as_deref().unwrap_or(&self.name)
    }
}

/// Precomputed tensor exposed as an index macro
///
/// `components` holds one expression per component in flattened order,
/// last index fastest; an empty string stands for zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDecl {
    pub name: String,
    pub rank: usize,
    #[serde(default = "default_tensor_class")]
    pub class: IndexClass,
    #[serde(default)]
    pub unroll: UnrollBehaviour,
    #[serde(default)]
    pub components: Vec<String>,
    /// Gradient of the potential; rolled output indexes the array declared
    /// with `RESOURCE_DV` when there is one
    #[serde(default)]
    pub derivative: bool,
}

fn default_tensor_class() -> IndexClass {
    IndexClass::Full
}

impl TensorDecl {
    /// Number of components the tensor must declare
    pub fn expected_components(&self, ranges: &IndexRanges) -> usize {
        ranges.range_for(self.class).pow(self.rank as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model: ModelInfo,
    #[serde(default)]
    pub fields: Vec<Symbol>,
    #[serde(default)]
    pub parameters: Vec<Symbol>,
    #[serde(default)]
    pub tensors: Vec<TensorDecl>,
}

impl ModelDescriptor {
    /// Parse and validate a TOML model description
    pub fn from_toml_str(content: &str) -> Result<Self, ModelError> {
        let model: ModelDescriptor = toml::from_str(content).map_err(|e| ModelError::Parse {
            message: e.to_string(),
        })?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let model = Self::from_toml_str(&content)?;

        log_success!(codes::success::MODEL_LOADED, "Model loaded",
            "model" => &model.model.name,
            "fields" => model.fields.len(),
            "parameters" => model.parameters.len(),
            "tensors" => model.tensors.len()
        );
        Ok(model)
    }

    pub fn ranges(&self) -> IndexRanges {
        IndexRanges::new(self.fields.len(), self.parameters.len())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn latex_names(&self) -> Vec<&str> {
        self.fields.iter().map(Symbol::latex_or_name).collect()
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |message: String| ModelError::Validation {
            model: self.model.name.clone(),
            message,
        };

        if self.model.name.trim().is_empty() {
            return Err(invalid("model name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for symbol in self.fields.iter().chain(&self.parameters) {
            if !is_identifier(&symbol.name) {
                return Err(invalid(format!("'{}' is not a valid identifier", symbol.name)));
            }
            if !seen.insert(symbol.name.as_str()) {
                return Err(invalid(format!("'{}' is declared twice", symbol.name)));
            }
        }

        let ranges = self.ranges();
        let mut tensor_names = HashSet::new();
        for tensor in &self.tensors {
            if !is_identifier(&tensor.name) || tensor.name.len() > MAX_MACRO_NAME_LENGTH {
                return Err(invalid(format!("'{}' is not a valid macro name", tensor.name)));
            }
            if !tensor_names.insert(tensor.name.as_str()) {
                return Err(invalid(format!("tensor '{}' is declared twice", tensor.name)));
            }
            if tensor.rank == 0 || tensor.rank > MAX_INDICES_PER_MACRO {
                return Err(invalid(format!(
                    "tensor '{}' has rank {} (expected 1 to {})",
                    tensor.name, tensor.rank, MAX_INDICES_PER_MACRO
                )));
            }
            if tensor.derivative && (tensor.rank != 1 || tensor.class != IndexClass::FieldOnly) {
                return Err(invalid(format!(
                    "derivative tensor '{}' must be rank 1 over field_only indices",
                    tensor.name
                )));
            }
            let expected = tensor.expected_components(&ranges);
            if tensor.components.len() != expected {
                return Err(invalid(format!(
                    "tensor '{}' declares {} components, expected {}",
                    tensor.name,
                    tensor.components.len(),
                    expected
                )));
            }
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const QUARTIC: &str = r#"
        [model]
        name = "quartic"
        author = "A. Author"

        [[fields]]
        name = "phi"
        latex = "\\phi"

        [[parameters]]
        name = "lambda"

        [[tensors]]
        name = "U2"
        rank = 2
        unroll = "force"
        components = ["0", "1", "-3*lambda*phi*phi", "0"]
    "#;

    #[test]
    fn parses_descriptor() {
        let model = ModelDescriptor::from_toml_str(QUARTIC).unwrap();
        assert_eq!(model.model.class, "canonical");
        assert_eq!(model.ranges(), IndexRanges::new(1, 1));
        assert_eq!(model.latex_names(), vec!["\\phi"]);
        assert_eq!(model.tensors[0].class, IndexClass::Full);
        assert_eq!(model.tensors[0].unroll, UnrollBehaviour::Force);
    }

    #[test]
    fn component_count_is_checked() {
        let content = QUARTIC.replace("\"0\", \"1\", ", "");
        let result = ModelDescriptor::from_toml_str(&content);
        assert_matches!(result, Err(ModelError::Validation { message, .. }) if message.contains("expected 4"));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let content = QUARTIC.replace("name = \"lambda\"", "name = \"phi\"");
        let result = ModelDescriptor::from_toml_str(&content);
        assert_matches!(result, Err(ModelError::Validation { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = ModelDescriptor::from_toml_str("[model\nname = 1");
        assert_matches!(result, Err(ref e @ ModelError::Parse { .. }) if e.error_code() == codes::model::MODEL_PARSE_ERROR);
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(QUARTIC.as_bytes()).unwrap();
        let model = ModelDescriptor::load(file.path()).unwrap();
        assert_eq!(model.model.name, "quartic");

        let missing = ModelDescriptor::load(Path::new("/nonexistent/model.toml"));
        assert_matches!(missing, Err(ModelError::Io { .. }));
    }
}
