//! Translation units: one template in, one generated file out

use crate::agent::{Diagnostic, ErrorContext, MacroAgent};
use crate::config::TranslationPreferences;
use crate::logging::{self, codes};
use crate::template::{TemplateFileError, TemplateReader};
use crate::utils::SourceMap;
use crate::{log_error, log_info, log_performance};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error(transparent)]
    Template(#[from] TemplateFileError),

    #[error("Cannot write {path}: {message}")]
    OutputWrite { path: String, message: String },

    #[error("Translation of {path} failed with {errors} error(s)")]
    Failed {
        path: String,
        errors: usize,
        diagnostics: Vec<String>,
    },
}

impl TranslationError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            TranslationError::Template(error) => error.error_code(),
            TranslationError::OutputWrite { .. } => codes::translation::OUTPUT_WRITE_FAILURE,
            TranslationError::Failed { .. } => codes::translation::TRANSLATION_FAILED,
        }
    }
}

/// Expanded text of a whole template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedSource {
    pub text: String,
    pub lines_in: usize,
    pub lines_out: usize,
    pub replacements: usize,
}

/// Run every line of `source` through the agent
///
/// Line numbers are set on the agent's error context before each line, so
/// diagnostics point back into the template.
pub fn translate_source(agent: &mut MacroAgent, source: &str) -> TranslatedSource {
    let mut translated = TranslatedSource::default();

    for (number, line) in source.lines().enumerate() {
        agent.context_mut().set_line(number as u32 + 1, line);
        let output = agent.apply(line);

        translated.lines_in += 1;
        translated.lines_out += output.lines.len();
        translated.replacements += output.replacements;
        for generated in output.lines {
            translated.text.push_str(&generated);
            translated.text.push('\n');
        }
    }

    if !source.ends_with('\n') && translated.text.ends_with('\n') {
        translated.text.pop();
    }
    translated
}

/// Diagnostics with the offending template line underlined where known
pub fn render_diagnostics(source: &str, diagnostics: &[Diagnostic]) -> Vec<String> {
    let map = SourceMap::new(source.to_string());
    diagnostics
        .iter()
        .map(|diagnostic| match diagnostic.span {
            Some(span) if map.get_line(diagnostic.line).is_some() => map
                .format_diagnostic(&span, &diagnostic.to_string())
                .trim_end()
                .to_string(),
            _ => diagnostic.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub lines_in: usize,
    pub lines_out: usize,
    pub replacements: usize,
    pub errors: usize,
    pub warnings: usize,
    pub duration: Duration,
    pub diagnostics: Vec<String>,
}

impl TranslationReport {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

/// Reads templates, expands them and writes the generated files
#[derive(Debug, Clone)]
pub struct Translator {
    reader: TemplateReader,
    preferences: TranslationPreferences,
}

impl Translator {
    pub fn new(preferences: TranslationPreferences) -> Self {
        let reader =
            TemplateReader::new().with_performance_logging(preferences.enable_performance_logging);
        Self {
            reader,
            preferences,
        }
    }

    pub fn preferences(&self) -> &TranslationPreferences {
        &self.preferences
    }

    /// Generated file path: the template extension is replaced by the output
    /// extension, or stripped when none is configured
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let is_template = input.extension().and_then(|ext| ext.to_str())
            == Some(self.preferences.template_extension.as_str());

        match (&self.preferences.output_extension, is_template) {
            (Some(extension), _) => input.with_extension(extension),
            (None, true) => input.with_extension(""),
            (None, false) => {
                let mut name = input.as_os_str().to_owned();
                name.push(".out");
                PathBuf::from(name)
            }
        }
    }

    /// Translate one template; the file context is set for the duration so
    /// logged diagnostics are collected against `input`
    pub fn translate_file(
        &self,
        agent: &mut MacroAgent,
        input: &Path,
        output: &Path,
        file_id: usize,
    ) -> Result<TranslationReport, TranslationError> {
        logging::with_file_context(input.to_path_buf(), file_id, || {
            self.translate_in_context(agent, input, output)
        })
    }

    fn translate_in_context(
        &self,
        agent: &mut MacroAgent,
        input: &Path,
        output: &Path,
    ) -> Result<TranslationReport, TranslationError> {
        let started = Instant::now();
        log_info!("Translating template", "file" => input.display());

        let template = self.reader.read(input)?;

        let previous = agent.replace_context(ErrorContext::for_file(input));
        let translated = translate_source(agent, &template.source);
        let mut ctx = agent.replace_context(previous);

        let errors = ctx.error_count();
        let warnings = ctx.warning_count();
        let diagnostics = render_diagnostics(&template.source, &ctx.take_diagnostics());

        if self.preferences.fail_on_errors && errors > 0 {
            return Err(TranslationError::Failed {
                path: input.display().to_string(),
                errors,
                diagnostics,
            });
        }

        fs::write(output, &translated.text).map_err(|e| {
            let error = TranslationError::OutputWrite {
                path: output.display().to_string(),
                message: e.to_string(),
            };
            log_error!(error.error_code(), &error.to_string());
            error
        })?;

        let report = TranslationReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            lines_in: translated.lines_in,
            lines_out: translated.lines_out,
            replacements: translated.replacements,
            errors,
            warnings,
            duration: started.elapsed(),
            diagnostics,
        };

        if self.preferences.enable_performance_logging {
            log_performance!(codes::success::TRANSLATION_COMPLETE, "Template translated",
                duration = report.duration,
                "file" => input.display(),
                "lines_in" => report.lines_in,
                "lines_out" => report.lines_out,
                "replacements" => report.replacements
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::index::{IndexConvention, IndexRanges};
    use crate::rules::{RuleRegistry, SimpleRule};
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn agent() -> MacroAgent {
        let mut builder = RuleRegistry::builder();
        builder
            .pre(SimpleRule::new("NAME", 0, |_| Ok("quartic".to_string())))
            .unwrap();
        MacroAgent::new(
            Arc::new(builder.build()),
            AgentConfig::default(),
            IndexConvention::default(),
            IndexRanges::new(1, 1),
        )
    }

    fn preferences(fail_on_errors: bool) -> TranslationPreferences {
        TranslationPreferences {
            template_extension: "tmpl".to_string(),
            output_extension: None,
            enable_performance_logging: false,
            fail_on_errors,
        }
    }

    #[test]
    fn translate_source_keeps_line_structure() {
        let mut agent = agent();
        let translated = translate_source(&mut agent, "// $$__NAME\nint x = 0;");
        assert_eq!(translated.text, "// quartic\nint x = 0;");
        assert_eq!(translated.lines_in, 2);
        assert_eq!(translated.lines_out, 2);
        assert_eq!(translated.replacements, 1);
    }

    #[test]
    fn diagnostics_carry_template_line() {
        let mut agent = agent();
        let source = "ok\nx = $$__BOGUS;\n";
        translate_source(&mut agent, source);

        let rendered = render_diagnostics(source, agent.context().diagnostics());
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].starts_with("2:5: error[E020]"));
        assert!(rendered[0].contains("2 | x = $$__BOGUS;"));
    }

    #[test]
    fn output_paths() {
        let translator = Translator::new(preferences(false));
        assert_eq!(
            translator.output_path_for(Path::new("kernels/mpp.h.tmpl")),
            PathBuf::from("kernels/mpp.h")
        );
        assert_eq!(
            translator.output_path_for(Path::new("kernels/mpp.txt")),
            PathBuf::from("kernels/mpp.txt.out")
        );

        let mut prefs = preferences(false);
        prefs.output_extension = Some("cpp".to_string());
        assert_eq!(
            Translator::new(prefs).output_path_for(Path::new("core.tmpl")),
            PathBuf::from("core.cpp")
        );
    }

    #[test]
    fn translate_file_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("core.h.tmpl");
        fs::write(&input, "// model: $$__NAME\nx = $$__BOGUS;\n").unwrap();

        let translator = Translator::new(preferences(false));
        let output = translator.output_path_for(&input);
        let mut agent = agent();
        let report = translator
            .translate_file(&mut agent, &input, &output, 1)
            .unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "// model: quartic\nx = $$__BOGUS;\n"
        );
        assert_eq!(report.errors, 1);
        assert!(!report.is_clean());
        assert!(report.diagnostics[0].contains("core.h.tmpl:2:5"));
        // The agent's own context is restored afterwards
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn fail_on_errors_skips_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("core.tmpl");
        fs::write(&input, "x = $$__BOGUS;\n").unwrap();

        let translator = Translator::new(preferences(true));
        let output = translator.output_path_for(&input);
        let result = translator.translate_file(&mut agent(), &input, &output, 1);

        assert_matches!(result, Err(TranslationError::Failed { errors: 1, .. }));
        assert!(!output.exists());
    }

    #[test]
    fn missing_template_is_reported() {
        let translator = Translator::new(preferences(false));
        let result = translator.translate_file(
            &mut agent(),
            Path::new("/nonexistent/core.tmpl"),
            Path::new("/nonexistent/core"),
            1,
        );
        assert_matches!(
            result,
            Err(ref e @ TranslationError::Template(TemplateFileError::FileNotFound { .. }))
                if e.error_code() == codes::file_processing::FILE_NOT_FOUND
        );
    }
}
