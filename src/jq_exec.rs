//! jq filter execution for instance pre-processing, via jaq.
//!
//! Dashboards often arrive wrapped in API export envelopes; a filter like
//! `.dashboard` (or one that explodes a list export into its members) runs
//! over each input document before conversion.

use anyhow::{Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, load};
use jaq_json::Val;
use serde_json::Value;

/// Compile `filter_src` and run it over `input`, returning every value the
/// filter produces.
pub fn run_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File {
        code: filter_src,
        path: (),
    };

    let modules = loader.load(&arena, program).map_err(|errs| {
        collect_errors(
            "jq parse",
            errs.iter().map(|(file, err)| format!("{err:?} in `{}`", file.code)),
        )
    })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| {
            collect_errors(
                "jq compile",
                errs.iter().flat_map(|(file, undefined)| {
                    undefined
                        .iter()
                        .map(move |(name, kind)| format!("undefined `{name}`: {kind:?} in `{}`", file.code))
                }),
            )
        })?;

    let inputs = RcIter::new(core::iter::empty());
    let mut out = Vec::new();
    for item in filter.run((Ctx::new([], &inputs), Val::from(input.clone()))) {
        let val = item.map_err(|e| anyhow!("jq eval: {e:?}"))?;
        out.push(Value::from(val));
    }
    Ok(out)
}

fn collect_errors(stage: &str, messages: impl Iterator<Item = String>) -> anyhow::Error {
    let mut combined = String::new();
    for message in messages {
        combined.push_str(&message);
        combined.push('\n');
    }
    anyhow!("{stage}: {}", combined.trim_end())
}
