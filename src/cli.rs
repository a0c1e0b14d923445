//! CLI: generate | classify | instance.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use crate::defaults::Comparison;
use crate::render::Language;
use crate::{instance, load, render};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate object builders from a dashboard schema document
#[derive(Parser, Debug)]
#[command(name = "dashgen")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// print comparator traces and per-file progress
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// render builder modules, an import index, and docs for every schema
    Generate(GenerateOut),
    /// print the classified property listing for one schema as JSON
    Classify(ClassifyOut),
    /// rewrite instance documents as builder calls, eliding defaults
    Instance(InstanceOut),
}

#[derive(Args, Debug, Clone)]
struct SpecSettings {
    /// schema document to read
    #[arg(long)]
    spec: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// output root directory
    #[arg(short, long, default_value = "_gen")]
    out: PathBuf,

    /// output language
    #[arg(long, value_enum, default_value = "jsonnet")]
    language: Language,

    /// limit generation to the named schemas
    #[arg(long, num_args = 1..)]
    only: Vec<String>,
}

#[derive(Args, Debug)]
struct ClassifyOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// schema to classify
    #[arg(long)]
    schema: String,

    /// instance document; adds the non-default partitions to the listing
    #[arg(long)]
    values: Option<PathBuf>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InstanceOut {
    #[command(flatten)]
    spec_settings: SpecSettings,

    /// root schema the instances conform to
    #[arg(long, default_value = "Dashboard")]
    schema: String,

    /// one or more inputs, literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// jq pre-process filter for each document
    #[arg(long)]
    jq_expr: Option<String>,

    /// fail on the first property the comparator cannot decide, instead of
    /// skipping it with a warning
    #[arg(long)]
    strict: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => self.run_generate(target),
            Command::Classify(target) => self.run_classify(target),
            Command::Instance(target) => self.run_instance(target),
        }
    }

    fn run_generate(&self, target: &GenerateOut) -> Result<()> {
        let spec = load::load_spec(&target.spec_settings.spec)?;
        let written = render::generate(&spec, target.language, &target.out, &target.only)?;
        if self.verbose {
            for path in &written {
                eprintln!("wrote {}", path.display());
            }
        }
        Ok(())
    }

    fn run_classify(&self, target: &ClassifyOut) -> Result<()> {
        let spec = load::load_spec(&target.spec_settings.spec)?;
        let schema = spec.components.schemas.get(&target.schema).with_context(|| {
            format!(
                "schema `{}` not found in {}",
                target.schema,
                target.spec_settings.spec.display()
            )
        })?;

        let mut listing = serde_json::Map::new();
        listing.insert("topLevelSimple".into(), serde_json::to_value(schema.top_level_simple())?);
        listing.insert("topLevelObjects".into(), serde_json::to_value(schema.top_level_objects())?);
        listing.insert("topLevelArrays".into(), serde_json::to_value(schema.top_level_arrays())?);
        listing.insert(
            "topLevelObjectArrays".into(),
            serde_json::to_value(schema.top_level_object_arrays())?,
        );
        listing.insert(
            "readOnlyWithDefaults".into(),
            serde_json::to_value(schema.read_only_defaults())?,
        );
        listing.insert("nestedSimple".into(), serde_json::to_value(schema.nested_simple())?);
        listing.insert(
            "nestedObjectArrays".into(),
            serde_json::to_value(schema.nested_object_arrays())?,
        );

        if let Some(values_path) = &target.values {
            let documents = load::load_instances(values_path, None)?;
            let values = documents
                .first()
                .and_then(Value::as_object)
                .with_context(|| format!("{} is not a JSON object", values_path.display()))?;
            let top = schema.top_level_simple_non_default(values);
            let nested = schema.nested_simple_non_default(values);
            self.trace(&top.trace);
            self.trace(&nested.trace);
            for error in top.skipped.iter().chain(&nested.skipped) {
                self.warn(&error.to_string());
            }
            listing.insert(
                "topLevelSimpleNonDefault".into(),
                serde_json::to_value(&top.matched)?,
            );
            listing.insert(
                "nestedSimpleNonDefault".into(),
                serde_json::to_value(&nested.matched)?,
            );
            let skipped: Vec<String> = top
                .skipped
                .iter()
                .chain(&nested.skipped)
                .map(|e| e.to_string())
                .collect();
            listing.insert("skipped".into(), serde_json::to_value(skipped)?);
        }

        let text = serde_json::to_string_pretty(&Value::Object(listing))?;
        match target.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                std::fs::write(out, &text).with_context(|| format!("writing {}", out.display()))?;
            }
            None => println!("{text}"),
        }
        Ok(())
    }

    fn run_instance(&self, target: &InstanceOut) -> Result<()> {
        let spec = load::load_spec(&target.spec_settings.spec)?;
        let extension = Language::Jsonnet.file_extension();
        for path in load::resolve_inputs(&target.input)? {
            let documents = load::load_instances(&path, target.jq_expr.as_deref())?;
            let fan_out = documents.len() > 1;
            for (index, document) in documents.iter().enumerate() {
                let conversion = instance::convert(&spec, &target.schema, document)
                    .with_context(|| format!("converting {}", path.display()))?;
                self.trace(&conversion.trace);
                for error in &conversion.skipped {
                    if target.strict {
                        anyhow::bail!("{error}");
                    }
                    self.warn(&error.to_string());
                }
                let out = if fan_out {
                    path.with_extension(format!("{index}.{extension}"))
                } else {
                    path.with_extension(extension)
                };
                std::fs::write(&out, &conversion.text)
                    .with_context(|| format!("writing {}", out.display()))?;
                if self.verbose {
                    eprintln!("wrote {}", out.display());
                }
            }
        }
        Ok(())
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {message}", "warning:".yellow().bold());
    }

    fn trace(&self, comparisons: &[Comparison]) {
        if !self.verbose {
            return;
        }
        for c in comparisons {
            eprintln!(
                "{} {}: {} <=> {} is_default={}",
                "compare".dimmed(),
                c.property,
                c.declared,
                c.observed,
                c.is_default
            );
        }
    }
}
