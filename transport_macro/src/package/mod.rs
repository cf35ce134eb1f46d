//! Rule packages
//!
//! A package contributes replacement rules and directives to a registry.
//! The standard set covers model metadata, field/parameter names,
//! precomputed tensors and resource declarations.

pub mod fundamental;
pub mod model;
pub mod resources;
pub mod tensor;

pub use fundamental::FundamentalPackage;
pub use model::{ModelDescriptor, ModelError, ModelInfo, Symbol, TensorDecl};
pub use resources::{DerivativeResource, ResourceManager, ResourcePackage, SharedResources};
pub use tensor::TensorPackage;

use crate::log_success;
use crate::logging::codes;
use crate::rules::{RegistryError, RuleRegistry, RuleRegistryBuilder};
use std::sync::Arc;

pub trait Package {
    fn name(&self) -> &str;

    fn register(&self, builder: &mut RuleRegistryBuilder) -> Result<(), RegistryError>;
}

/// Register every package into one registry; names must be unique across
/// all of them
pub fn build_registry(packages: &[&dyn Package]) -> Result<RuleRegistry, RegistryError> {
    let mut builder = RuleRegistry::builder();
    for package in packages {
        package.register(&mut builder)?;
    }
    let registry = builder.build();

    log_success!(codes::success::RULE_REGISTRY_BUILT, "Rule registry built",
        "packages" => packages.len(),
        "rules" => registry.len()
    );
    Ok(registry)
}

/// Registry of the standard packages for `model`, with its resource manager
pub fn standard_registry(
    model: Arc<ModelDescriptor>,
) -> Result<(RuleRegistry, SharedResources), RegistryError> {
    let resources = ResourceManager::shared();
    let fundamental = FundamentalPackage::new(model.clone(), resources.clone());
    let tensors = TensorPackage::new(model, resources.clone());
    let resource_directives = ResourcePackage::new(resources.clone());

    let registry = build_registry(&[&fundamental, &tensors, &resource_directives])?;
    Ok((registry, resources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use assert_matches::assert_matches;

    fn model(tensor: &str) -> Arc<ModelDescriptor> {
        let content = format!(
            "[model]\nname = \"m\"\n\n[[fields]]\nname = \"phi\"\n\n\
             [[tensors]]\nname = \"{}\"\nrank = 1\ncomponents = [\"1\", \"2\"]\n",
            tensor
        );
        Arc::new(ModelDescriptor::from_toml_str(&content).unwrap())
    }

    #[test]
    fn standard_registry_has_every_table() {
        let (registry, _) = standard_registry(model("U1")).unwrap();
        assert_eq!(registry.kind_of("NAME"), Some(RuleKind::Pre));
        assert_eq!(registry.kind_of("FIELD"), Some(RuleKind::Index));
        assert_eq!(registry.kind_of("U1"), Some(RuleKind::Index));
        assert_eq!(registry.kind_of("RESOURCE_RELEASE"), Some(RuleKind::SimpleDirective));
        assert_eq!(registry.kind_of("RESOURCE_DV"), Some(RuleKind::IndexDirective));
    }

    #[test]
    fn tensor_clashing_with_builtin_is_rejected() {
        let result = standard_registry(model("FIELD"));
        assert_matches!(
            result,
            Err(RegistryError::DuplicateRule { ref name, existing: RuleKind::Index }) if name == "FIELD"
        );
    }
}
