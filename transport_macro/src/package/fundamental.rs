//! Model metadata macros and the basic index macros

use super::model::ModelDescriptor;
use super::resources::{with_resources, SharedResources};
use super::Package;
use crate::index::{AssignmentRecord, IndexClass};
use crate::rules::{
    CacheHandle, CallbackResult, IndexRule, IndexRuleHandler, RegistryError, RolledIndex,
    RuleRegistryBuilder, SimpleRule,
};
use std::sync::Arc;

const TOOL_NAME: &str = env!("CARGO_PKG_NAME");
const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix naming the momentum conjugate to a field
pub const MOMENTUM_SUFFIX: &str = "_p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Fields,
    Parameters,
    Coordinates,
}

impl Table {
    fn default_array(self) -> &'static str {
        match self {
            Table::Fields => "__fields",
            Table::Parameters => "__params",
            Table::Coordinates => "__coords",
        }
    }
}

/// Renders a single index as a declared name; rolls into a resource array
struct NameTable {
    table: Table,
    names: Vec<String>,
    resources: SharedResources,
}

impl IndexRuleHandler for NameTable {
    fn unroll(
        &self,
        _args: &[String],
        indices: &[AssignmentRecord],
        _cache: &mut CacheHandle,
    ) -> CallbackResult {
        let record = indices[0];
        let name = self
            .names
            .get(record.species())
            .ok_or_else(|| format!("no symbol for index value {}", record.value))?;

        if self.table == Table::Coordinates && record.is_momentum() {
            Ok(format!("{}{}", name, MOMENTUM_SUFFIX))
        } else {
            Ok(name.clone())
        }
    }

    fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
        let declared = with_resources(&self.resources, |r| match self.table {
            Table::Parameters => r.parameters().map(str::to_string),
            Table::Fields | Table::Coordinates => r.coordinates().map(str::to_string),
        })?;
        let array = declared.unwrap_or_else(|| self.table.default_array().to_string());
        Ok(format!("{}[{}]", array, indices[0].variable))
    }
}

/// Quoted, comma separated list in braces: `{ "phi", "chi" }`
fn quoted_list(names: &[&str]) -> String {
    let quoted: Vec<String> = names
        .iter()
        .map(|name| format!("\"{}\"", name.replace('\\', "\\\\")))
        .collect();
    format!("{{ {} }}", quoted.join(", "))
}

pub struct FundamentalPackage {
    model: Arc<ModelDescriptor>,
    resources: SharedResources,
}

impl FundamentalPackage {
    pub fn new(model: Arc<ModelDescriptor>, resources: SharedResources) -> Self {
        Self { model, resources }
    }

    fn constant(name: &str, value: String) -> SimpleRule {
        SimpleRule::new(name, 0, move |_| Ok(value.clone()))
    }

    fn name_table(&self, table: Table) -> NameTable {
        let names = match table {
            Table::Parameters => self.model.parameter_names(),
            Table::Fields | Table::Coordinates => self.model.field_names(),
        };
        NameTable {
            table,
            names: names.into_iter().map(str::to_string).collect(),
            resources: self.resources.clone(),
        }
    }
}

impl Package for FundamentalPackage {
    fn name(&self) -> &str {
        "fundamental"
    }

    fn register(&self, builder: &mut RuleRegistryBuilder) -> Result<(), RegistryError> {
        let model = &self.model;
        let info = &model.model;

        builder
            .pre(Self::constant("TOOL", TOOL_NAME.to_string()))?
            .pre(Self::constant("VERSION", TOOL_VERSION.to_string()))?
            .pre(SimpleRule::new("DATE", 0, |_| {
                Ok(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
            }))?
            .pre(Self::constant("MODEL", info.class.clone()))?
            .pre(Self::constant("NAME", info.name.clone()))?
            .pre(Self::constant("AUTHOR", info.author.clone().unwrap_or_default()))?
            .pre(Self::constant("TAG", info.tag.clone().unwrap_or_default()))?
            .pre(Self::constant("NUMBER_FIELDS", model.fields.len().to_string()))?
            .pre(Self::constant("NUMBER_PARAMS", model.parameters.len().to_string()))?
            .pre(Self::constant("FIELD_NAME_LIST", quoted_list(&model.field_names())))?
            .pre(Self::constant("LATEX_NAME_LIST", quoted_list(&model.latex_names())))?
            .pre(Self::constant("PARAM_NAME_LIST", quoted_list(&model.parameter_names())))?;

        builder
            .index(IndexRule::new(
                "FIELD",
                0,
                1,
                Some(IndexClass::FieldOnly),
                self.name_table(Table::Fields),
            ))?
            .index(IndexRule::new(
                "PARAMETER",
                0,
                1,
                Some(IndexClass::Parameter),
                self.name_table(Table::Parameters),
            ))?
            .index(IndexRule::new(
                "COORDINATE",
                0,
                1,
                Some(IndexClass::Full),
                self.name_table(Table::Coordinates),
            ))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentConfig, MacroAgent};
    use crate::index::IndexConvention;
    use crate::package::resources::ResourcePackage;
    use crate::package::ResourceManager;
    use crate::rules::RuleRegistry;

    fn model() -> Arc<ModelDescriptor> {
        Arc::new(
            ModelDescriptor::from_toml_str(
                r#"
                [model]
                name = "double_quadratic"
                class = "canonical"
                tag = "dq-1"

                [[fields]]
                name = "phi"
                latex = "\\phi"

                [[fields]]
                name = "chi"

                [[parameters]]
                name = "m_phi"

                [[parameters]]
                name = "m_chi"
                "#,
            )
            .unwrap(),
        )
    }

    fn agent(unroll_by_default: bool) -> MacroAgent {
        let model = model();
        let resources = ResourceManager::shared();
        let mut builder = RuleRegistry::builder();
        FundamentalPackage::new(model.clone(), resources.clone())
            .register(&mut builder)
            .unwrap();
        ResourcePackage::new(resources).register(&mut builder).unwrap();

        let mut config = AgentConfig::default();
        config.unroll_by_default = unroll_by_default;
        config.unroll_threshold = None;
        MacroAgent::new(
            Arc::new(builder.build()),
            config,
            IndexConvention::default(),
            model.ranges(),
        )
    }

    #[test]
    fn metadata_macros() {
        let mut agent = agent(true);
        let output =
            agent.apply("// $$__NAME ($$__MODEL, $$__NUMBER_FIELDS fields, tag '$$__TAG')");
        assert_eq!(
            output.lines,
            vec!["// double_quadratic (canonical, 2 fields, tag 'dq-1')"]
        );

        let output = agent.apply("const char* names[] = $$__LATEX_NAME_LIST;");
        assert_eq!(
            output.lines,
            vec!["const char* names[] = { \"\\\\phi\", \"chi\" };"]
        );

        let output = agent.apply("// $$__TOOL $$__VERSION");
        assert_eq!(
            output.lines,
            vec![format!("// {} {}", TOOL_NAME, TOOL_VERSION)]
        );
    }

    #[test]
    fn coordinates_cover_momenta() {
        let mut agent = agent(true);
        let output = agent.apply("$$__COORDINATE[A],");
        assert_eq!(output.lines, vec!["phi,", "chi,", "phi_p,", "chi_p,"]);
    }

    #[test]
    fn parameter_class_is_enforced() {
        let mut agent = agent(true);
        agent.apply("x = $$__PARAMETER[a];");
        assert!(agent.context().has_errors());
    }

    #[test]
    fn rolled_output_uses_declared_resources() {
        let mut agent = agent(false);
        let output = agent.apply("m2 = $$__PARAMETER[l];");
        assert_eq!(output.lines, vec!["m2 = __params[__l];"]);

        agent.apply("$$__RESOURCE_PARAMETERS{raw_params}");
        let output = agent.apply("m2 = $$__PARAMETER[l];");
        assert_eq!(output.lines, vec!["m2 = raw_params[__l];"]);
    }
}
