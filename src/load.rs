//! Input loading: the spec document, instance documents, glob resolution.
//!
//! Parse errors carry the JSON path to the offending node; a spec with a
//! thousand properties is not debuggable from "invalid type" alone.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::spec::Spec;

/// Load and structurally validate a spec document.
pub fn load_spec(path: &Path) -> Result<Spec> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading spec file {}", path.display()))?;
    let spec: Spec = from_str_with_path(&source)
        .with_context(|| format!("parsing spec file {}", path.display()))?;
    spec.validate()?;
    Ok(spec)
}

/// Load one instance document, optionally passing it through a jq filter. A
/// filter may fan a single document out into several values.
pub fn load_instances(path: &Path, jq_expr: Option<&str>) -> Result<Vec<Value>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading instance file {}", path.display()))?;
    let value: Value = from_str_with_path(&source)
        .with_context(|| format!("parsing instance file {}", path.display()))?;
    match jq_expr {
        None => Ok(vec![value]),
        Some(expr) => crate::jq_exec::run_filter(expr, &value)
            .with_context(|| format!("applying jq filter to {}", path.display())),
    }
}

/// Resolve literal paths and glob patterns to concrete files. A pattern that
/// uses glob syntax but matches nothing is an error, not an empty run.
pub fn resolve_inputs<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in
                glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))?
            {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow::anyhow!("at JSON path {path}: {}", err.into_inner())
    })
}
