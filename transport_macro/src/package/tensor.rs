//! Precomputed tensors as index macros
//!
//! Each tensor in the model descriptor becomes an index rule. Its `pre`
//! hook renders the component table once per token into a cache handle,
//! `unroll` reads components by flattened index and `post` drops the cache.
//! Derivative tensors roll into the array a template declared for them.

use super::model::{ModelDescriptor, TensorDecl};
use super::resources::{with_resources, SharedResources};
use super::Package;
use crate::index::{AssignmentRecord, IndexRanges};
use crate::log_debug;
use crate::rules::{
    CacheHandle, CallbackResult, IndexRule, IndexRuleHandler, RegistryError, RolledIndex,
    RuleRegistryBuilder,
};
use std::sync::Arc;

/// Rendered components held for the lifetime of one token
#[derive(Debug)]
struct ComponentCache {
    rendered: Vec<String>,
    reads: usize,
}

struct TensorHandler {
    name: String,
    components: Arc<Vec<String>>,
    range: usize,
    /// Set for derivative tensors only
    resources: Option<SharedResources>,
}

impl TensorHandler {
    fn new(tensor: &TensorDecl, ranges: &IndexRanges, resources: &SharedResources) -> Self {
        Self {
            name: tensor.name.clone(),
            components: Arc::new(tensor.components.clone()),
            range: ranges.range_for(tensor.class),
            resources: tensor.derivative.then(|| resources.clone()),
        }
    }

    fn rolled_array(&self) -> Result<String, String> {
        let declared = match &self.resources {
            Some(resources) => with_resources(resources, |r| r.dv().map(|dv| dv.name.clone()))?,
            None => None,
        };
        Ok(declared.unwrap_or_else(|| self.name.clone()))
    }

    /// Row-major position of an assignment, last index fastest
    fn flatten(&self, indices: &[AssignmentRecord]) -> usize {
        indices
            .iter()
            .fold(0, |offset, record| offset * self.range + record.value)
    }
}

impl IndexRuleHandler for TensorHandler {
    fn pre(&self, _args: &[String]) -> Result<CacheHandle, String> {
        let rendered = self
            .components
            .iter()
            .map(|component| {
                let component = component.trim();
                if component.is_empty() {
                    "0".to_string()
                } else {
                    component.to_string()
                }
            })
            .collect();
        Ok(CacheHandle::new(ComponentCache { rendered, reads: 0 }))
    }

    fn unroll(
        &self,
        _args: &[String],
        indices: &[AssignmentRecord],
        cache: &mut CacheHandle,
    ) -> CallbackResult {
        let cache = cache
            .get_mut::<ComponentCache>()
            .ok_or_else(|| format!("component cache for '{}' was not primed", self.name))?;
        let position = self.flatten(indices);
        cache.reads += 1;
        cache
            .rendered
            .get(position)
            .cloned()
            .ok_or_else(|| format!("'{}' has no component {}", self.name, position))
    }

    fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
        let mut flat = String::new();
        for (position, index) in indices.iter().enumerate() {
            if position == 0 {
                flat.push_str(&index.variable);
            } else {
                flat = format!("({})*{} + {}", flat, self.range, index.variable);
            }
        }
        Ok(format!("{}[{}]", self.rolled_array()?, flat))
    }

    fn post(&self, cache: CacheHandle) {
        if let Some(cache) = cache.into_inner::<ComponentCache>() {
            log_debug!("Released tensor component cache",
                "tensor" => self.name,
                "reads" => cache.reads
            );
        }
    }
}

/// One index rule per declared tensor
pub struct TensorPackage {
    model: Arc<ModelDescriptor>,
    resources: SharedResources,
}

impl TensorPackage {
    pub fn new(model: Arc<ModelDescriptor>, resources: SharedResources) -> Self {
        Self { model, resources }
    }
}

impl Package for TensorPackage {
    fn name(&self) -> &str {
        "tensors"
    }

    fn register(&self, builder: &mut RuleRegistryBuilder) -> Result<(), RegistryError> {
        let ranges = self.model.ranges();
        for tensor in &self.model.tensors {
            let rule = IndexRule::new(
                &tensor.name,
                0,
                tensor.rank,
                Some(tensor.class),
                TensorHandler::new(tensor, &ranges, &self.resources),
            )
            .with_unroll(tensor.unroll);
            builder.index(rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, MacroAgent};
    use crate::index::IndexConvention;
    use crate::package::model::ModelError;
    use crate::package::resources::{ResourceManager, ResourcePackage};
    use crate::rules::RuleRegistry;

    fn agent(unroll: &str) -> MacroAgent {
        let model = ModelDescriptor::from_toml_str(&format!(
            r#"
            [model]
            name = "single_field"

            [[fields]]
            name = "phi"

            [[tensors]]
            name = "A2"
            rank = 2
            unroll = "{}"
            components = ["1", "", "-V_phi", " 3 "]
            "#,
            unroll
        ))
        .unwrap();

        let mut builder = RuleRegistry::builder();
        TensorPackage::new(Arc::new(model.clone()), ResourceManager::shared())
            .register(&mut builder)
            .unwrap();
        let mut config = AgentConfig::default();
        config.unroll_by_default = true;
        config.unroll_threshold = None;
        MacroAgent::new(
            Arc::new(builder.build()),
            config,
            IndexConvention::default(),
            model.ranges(),
        )
    }

    #[test]
    fn unrolls_flattened_components() {
        let mut agent = agent("allow");
        let output = agent.apply("__u[$$__A][$$__B] = $$__A2[A B];");
        assert_eq!(
            output.lines,
            vec![
                "__u[0][0] = 1;",
                "__u[0][1] = 0;",
                "__u[1][0] = -V_phi;",
                "__u[1][1] = 3;",
            ]
        );
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn prevented_tensor_rolls_to_array_access() {
        let mut agent = agent("prevent");
        let output = agent.apply("__u[$$__A][$$__B] = $$__A2[A B];");
        assert_eq!(output.lines, vec!["__u[__A][__B] = A2[(__A)*2 + __B];"]);
    }

    #[test]
    fn rank_mismatch_is_reported() {
        let mut agent = agent("allow");
        agent.apply("x = $$__A2[A];");
        assert!(agent.context().has_errors());
    }

    #[test]
    fn derivative_rolls_into_declared_array() {
        let model = Arc::new(
            ModelDescriptor::from_toml_str(
                r#"
                [model]
                name = "double_quadratic"

                [[fields]]
                name = "phi"

                [[fields]]
                name = "chi"

                [[tensors]]
                name = "DV"
                rank = 1
                class = "field_only"
                unroll = "prevent"
                derivative = true
                components = ["m*phi", "m*chi"]
                "#,
            )
            .unwrap(),
        );

        let resources = ResourceManager::shared();
        let mut builder = RuleRegistry::builder();
        TensorPackage::new(model.clone(), resources.clone())
            .register(&mut builder)
            .unwrap();
        ResourcePackage::new(resources).register(&mut builder).unwrap();
        let mut agent = MacroAgent::new(
            Arc::new(builder.build()),
            AgentConfig::default(),
            IndexConvention::default(),
            model.ranges(),
        );

        let output = agent.apply("__dV[$$__a] = $$__DV[a];");
        assert_eq!(output.lines, vec!["__dV[__a] = DV[__a];"]);

        agent.apply("$$__RESOURCE_DV[b]{dV}");
        let output = agent.apply("__dV[$$__a] = $$__DV[a];");
        assert_eq!(output.lines, vec!["__dV[__a] = dV[__a];"]);

        agent.apply("$$__RESOURCE_RELEASE");
        let output = agent.apply("__dV[$$__a] = $$__DV[a];");
        assert_eq!(output.lines, vec!["__dV[__a] = DV[__a];"]);
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn derivative_must_be_a_field_gradient() {
        let result = ModelDescriptor::from_toml_str(
            r#"
            [model]
            name = "bad"

            [[fields]]
            name = "phi"

            [[tensors]]
            name = "DDV"
            rank = 2
            derivative = true
            components = ["1", "0", "0", "1"]
            "#,
        );
        assert!(matches!(result, Err(ModelError::Validation { .. })));
    }
}
