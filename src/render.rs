//! Rendering plumbing: target-language metadata, identifier rules, and
//! writing the generated tree.
//!
//! Schemas render independently, so the per-schema work fans out over a
//! thread pool; results are collected and written in sorted path order to
//! keep the output tree byte-stable.

pub mod jsonnet;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::spec::Spec;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Supported output languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Language {
    Jsonnet,
}

/// One generated file, relative to the language's output directory.
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub text: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Language {
    pub fn directory(self) -> &'static str {
        match self {
            Self::Jsonnet => "jsonnet",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Jsonnet => "libsonnet",
        }
    }

    /// File and object names both use lowerCamelCase in jsonnet output.
    pub fn file_name(self, schema_name: &str) -> String {
        format!("{}.{}", camelize_down(schema_name), self.file_extension())
    }

    pub fn object_name(self, schema_name: &str) -> String {
        camelize_down(schema_name)
    }
}

/// Render builder modules for every schema (or the `only` subset), plus the
/// import index and docs, and write the tree under
/// `<out>/<info.version>/<language dir>/`. Returns the written paths.
pub fn generate(spec: &Spec, language: Language, out_root: &Path, only: &[String]) -> Result<Vec<PathBuf>> {
    for name in only {
        if !spec.components.schemas.contains_key(name) {
            anyhow::bail!("schema `{name}` not found in the spec document");
        }
    }

    let mut names: Vec<&str> = spec
        .components
        .schemas
        .keys()
        .map(String::as_str)
        .filter(|name| only.is_empty() || only.iter().any(|o| o == name))
        .collect();
    names.sort_unstable();

    let mut artifacts = names
        .par_iter()
        .map(|name| -> Result<Artifact> {
            let schema = &spec.components.schemas[*name];
            let text = match language {
                Language::Jsonnet => jsonnet::builder_module(schema)
                    .with_context(|| format!("rendering schema `{name}`"))?,
            };
            Ok(Artifact {
                path: PathBuf::from(language.file_name(name)),
                text,
            })
        })
        .collect::<Result<Vec<Artifact>>>()?;

    match language {
        Language::Jsonnet => {
            artifacts.push(Artifact {
                path: PathBuf::from("main.libsonnet"),
                text: jsonnet::index_module(&names, language),
            });
            artifacts.push(Artifact {
                path: PathBuf::from("DOCS.md"),
                text: jsonnet::docs(spec, &names, language)?,
            });
        }
    }

    let dir = out_root.join(&spec.info.version).join(language.directory());
    write_tree(&dir, artifacts)
}

fn write_tree(dir: &Path, mut artifacts: Vec<Artifact>) -> Result<Vec<PathBuf>> {
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let dest = dir.join(&artifact.path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        std::fs::write(&dest, &artifact.text)
            .with_context(|| format!("writing {}", dest.display()))?;
        written.push(dest);
    }
    Ok(written)
}

// ————————————————————————————————————————————————————————————————————————————
// NAMING
// ————————————————————————————————————————————————————————————————————————————

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// jsonnet reserved words; fields and parameters may not collide with them.
const KEYWORDS: &[&str] = &[
    "assert",
    "else",
    "error",
    "false",
    "for",
    "function",
    "if",
    "import",
    "importstr",
    "in",
    "local",
    "null",
    "self",
    "super",
    "tailstrict",
    "then",
    "true",
];

/// lowerCamelCase. Non-alphanumeric characters act as word separators; an
/// already-camel name keeps its interior capitals.
pub fn camelize_down(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if !(c.is_alphanumeric() || c == '_') {
            upper_next = !out.is_empty();
            continue;
        }
        if out.is_empty() {
            out.extend(c.to_lowercase());
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// UpperCamelCase, for the `With`/`Add` halves of accessor names.
pub fn camelize_up(name: &str) -> String {
    let mut out = camelize_down(name);
    if let Some(first) = out.chars().next() {
        let upper: String = first.to_uppercase().collect();
        out.replace_range(..first.len_utf8(), &upper);
    }
    out
}

/// Naive singular form for appender names: `panels` becomes `panel`.
pub fn singularize(name: &str) -> String {
    // "series" is its own plural
    if name.ends_with("series") {
        return name.to_string();
    }
    if let Some(stem) = name.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if name.ends_with("ss") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// A function-parameter identifier derived from a property or display name.
/// Camelized; keyword collisions get a suffix, a leading digit a prefix.
pub fn param_name(name: &str) -> String {
    let mut base = camelize_down(name);
    if base.is_empty() {
        base.push('_');
    }
    if base.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        base.insert(0, '_');
    }
    if KEYWORDS.contains(&base.as_str()) {
        base.push_str("Value");
    }
    base
}

/// Parameter names for a flattened argument list, index-aligned with the
/// input. Display names win; when two leaves share one, the full location
/// path disambiguates.
pub fn parameter_names(flats: &[crate::classify::FlatSchema]) -> Vec<String> {
    let mut seen: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    let displays: Vec<String> = flats
        .iter()
        .map(|flat| param_name(flat.schema.human_name(flat.name)))
        .collect();
    for display in &displays {
        *seen.entry(display.clone()).or_default() += 1;
    }
    flats
        .iter()
        .zip(&displays)
        .map(|(flat, display)| {
            if seen[display] > 1 {
                param_name(&flat.location.join(" "))
            } else {
                display.clone()
            }
        })
        .collect()
}

/// A field segment in generated jsonnet, quoted when the raw name is not a
/// plain identifier.
pub fn field_name(name: &str) -> String {
    if IDENTIFIER.is_match(name) && !KEYWORDS.contains(&name) {
        name.to_string()
    } else {
        format!("'{}'", name.escape_default())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
