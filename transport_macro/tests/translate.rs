//! End-to-end translation of template directories against a model file

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use transport_macro::config::TranslationPreferences;
use transport_macro::{
    AgentConfig, AgentFactory, BatchConfig, BatchProcessor, ModelDescriptor, Translator,
};

const MODEL: &str = r#"
[model]
name = "quadratic_pair"
author = "Transport Developers"

[[fields]]
name = "phi"
latex = "\\phi"

[[fields]]
name = "chi"

[[parameters]]
name = "m2"

[[tensors]]
name = "MASS"
rank = 1
class = "field_only"
components = ["m2*phi", "m2*chi"]
"#;

const KERNEL: &str = "\
// $$__NAME generated by $$__TOOL
const unsigned int N = $$__NUMBER_FIELDS;
__dV[$$__a] = $$__MASS[a];
return 0;
";

fn model(dir: &Path) -> Arc<ModelDescriptor> {
    let path = dir.join("model.toml");
    fs::write(&path, MODEL).unwrap();
    Arc::new(ModelDescriptor::load(&path).unwrap())
}

fn preferences() -> TranslationPreferences {
    TranslationPreferences {
        template_extension: "tmpl".to_string(),
        output_extension: None,
        enable_performance_logging: false,
        fail_on_errors: false,
    }
}

fn agent_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.unroll_by_default = true;
    config.unroll_threshold = None;
    config
}

#[test]
fn single_template_is_expanded() {
    let dir = tempdir().unwrap();
    let factory = AgentFactory::for_model(model(dir.path()), agent_config());
    let translator = Translator::new(preferences());

    let input = dir.path().join("kernel.h.tmpl");
    fs::write(&input, KERNEL).unwrap();
    let output = translator.output_path_for(&input);

    let mut agent = factory.build().unwrap();
    let report = translator
        .translate_file(&mut agent, &input, &output, 0)
        .unwrap();

    let expected = format!(
        "// quadratic_pair generated by {}\n\
         const unsigned int N = 2;\n\
         __dV[0] = m2*phi;\n\
         __dV[1] = m2*chi;\n\
         return 0;\n",
        env!("CARGO_PKG_NAME")
    );
    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    assert_eq!(report.lines_in, 4);
    assert_eq!(report.lines_out, 5);
    assert!(report.is_clean());
}

#[test]
fn unknown_macros_are_diagnosed_and_left_in_place() {
    let dir = tempdir().unwrap();
    let factory = AgentFactory::for_model(model(dir.path()), agent_config());
    let translator = Translator::new(preferences());

    let input = dir.path().join("broken.tmpl");
    fs::write(&input, "ok\nx = $$__SPECIES;\n").unwrap();
    let output = translator.output_path_for(&input);

    let report = translator
        .translate_file(&mut factory.build().unwrap(), &input, &output, 0)
        .unwrap();

    assert_eq!(report.errors, 1);
    assert!(report.diagnostics[0].contains("E020"));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "ok\nx = $$__SPECIES;\n"
    );
}

#[test]
fn batch_translation_keeps_resources_per_template() {
    let dir = tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir(&templates).unwrap();
    // Each template gets its own agent, so a resource declared in one does
    // not leak into the other
    fs::write(
        templates.join("a.tmpl"),
        "$$__RESOURCE_PARAMETERS{raw}\nm = $$__PARAMETER[l];\n",
    )
    .unwrap();
    fs::write(templates.join("b.tmpl"), "m = $$__PARAMETER[l];\n").unwrap();

    let mut config = agent_config().with_recursion_max(4);
    config.unroll_by_default = false;
    let factory = AgentFactory::for_model(model(dir.path()), config);
    let processor = BatchProcessor::new(
        factory,
        Translator::new(preferences()),
        BatchConfig {
            max_threads: 2,
            recursive: false,
            max_files: None,
            fail_fast: false,
        },
    );

    let results = processor.process_directory(&templates).unwrap();
    assert_eq!(results.success_count(), 2);
    assert_eq!(results.failure_count(), 0);

    assert_eq!(
        fs::read_to_string(templates.join("a")).unwrap(),
        "\nm = raw[__l];\n"
    );
    assert_eq!(
        fs::read_to_string(templates.join("b")).unwrap(),
        "m = __params[__l];\n"
    );
}
