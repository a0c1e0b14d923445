//! Rewriting a concrete instance document as builder calls.
//!
//! Round trip of the classifier's `location` machinery: a dashboard JSON
//! export comes in, a jsonnet program over the generated library comes out.
//! Properties whose value equals their declared default are elided, since
//! the builders assign those on their own.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::classify::value_at;
use crate::defaults::{CompareError, Comparison};
use crate::render::{Language, field_name, jsonnet};
use crate::spec::{Schema, Spec};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A converted instance, plus everything the caller may want to report:
/// properties the comparator had no rule for, and the comparison trace.
#[derive(Debug)]
pub struct Conversion {
    pub text: String,
    pub skipped: Vec<CompareError>,
    pub trace: Vec<Comparison>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Rewrite `instance` as a chain of builder calls for `root_name`.
pub fn convert(spec: &Spec, root_name: &str, instance: &Value) -> Result<Conversion> {
    let schema = spec
        .components
        .schemas
        .get(root_name)
        .with_context(|| format!("schema `{root_name}` not found in the spec document"))?;
    let values = instance
        .as_object()
        .with_context(|| format!("instance document for `{root_name}` is not an object"))?;
    let builder = jsonnet::plan(schema)?;
    let language = Language::Jsonnet;

    let mut skipped = Vec::new();
    let mut trace = Vec::new();

    let mut text = String::from("local lib = import 'main.libsonnet';\n\n");
    text.push_str(&format!(
        "lib.{}.new({})",
        language.object_name(root_name),
        constructor_args(schema, &builder, values, &mut skipped, &mut trace)?.join(", ")
    ));

    for setter in &builder.setters {
        let Some(value) = values.get(setter.target) else {
            continue;
        };
        if setter.params.is_empty() {
            // appenders rebuild arrays of objects element by element; a
            // whole value carrying them too would emit every element twice
            let mut remainder = value.clone();
            for appender in &builder.appenders {
                if appender.flat.location.len() > 1
                    && appender.flat.location.first() == Some(&setter.target)
                    && appender.flat.schema.is_object_array()
                {
                    prune(&mut remainder, &appender.flat.location[1..]);
                }
            }
            if remainder.as_object().is_some_and(Map::is_empty) {
                continue;
            }
            text.push_str(&format!(
                "\n  .{}({})",
                setter.accessor,
                encode(setter.target, &remainder)?
            ));
            continue;
        }
        let Some(sub_values) = value.as_object() else {
            continue;
        };
        let partition = setter.object.nested_simple_non_default(sub_values);
        let mut args = Vec::new();
        for flat in &partition.matched {
            let Some(value) = value_at(sub_values, &flat.location) else {
                continue;
            };
            let Some(param) = setter.params.iter().find(|p| p.flat.location == flat.location)
            else {
                continue;
            };
            args.push(format!("{}={}", param.name, encode(flat.name, value)?));
        }
        skipped.extend(partition.skipped);
        trace.extend(partition.trace);
        if args.is_empty() {
            continue;
        }
        text.push_str(&format!("\n  .{}({})", setter.accessor, args.join(", ")));
    }

    for appender in &builder.appenders {
        // scalar arrays already travel whole as constructor or setter
        // arguments; appenders reconstruct the element-by-element ones
        if !appender.flat.schema.is_object_array() {
            continue;
        }
        let Some(items) = appender.flat.schema.items.as_deref() else {
            continue;
        };
        let Some(value) = value_at(values, &appender.flat.location) else {
            continue;
        };
        let Some(elements) = value.as_array() else {
            continue;
        };
        for element in elements {
            let literal = element_literal(items, element, &mut skipped, &mut trace)?;
            text.push_str(&format!("\n  .{}({literal})", appender.accessor));
        }
    }

    text.push('\n');
    Ok(Conversion {
        text,
        skipped,
        trace,
    })
}

fn constructor_args(
    schema: &Schema,
    builder: &jsonnet::Builder<'_>,
    values: &Map<String, Value>,
    skipped: &mut Vec<CompareError>,
    trace: &mut Vec<Comparison>,
) -> Result<Vec<String>> {
    let partition = schema.top_level_simple_non_default(values);
    let mut args = Vec::new();
    for flat in &partition.matched {
        // a property can differ from its default by being absent; there is
        // no value to pass then
        let Some(value) = values.get(flat.name) else {
            continue;
        };
        let Some(param) = builder
            .constructor_params
            .iter()
            .find(|p| p.flat.name == flat.name)
        else {
            continue;
        };
        args.push(format!("{}={}", param.name, encode(flat.name, value)?));
    }
    skipped.extend(partition.skipped);
    trace.extend(partition.trace);
    Ok(args)
}

/// Inline object literal for one array element: non-default scalars by
/// comparison, composites and schema-unknown keys verbatim, read-only
/// fields dropped.
fn element_literal(
    items: &Schema,
    element: &Value,
    skipped: &mut Vec<CompareError>,
    trace: &mut Vec<Comparison>,
) -> Result<String> {
    let Some(values) = element.as_object() else {
        // a non-object element in an array of objects: reproduce verbatim
        return encode("item", element);
    };
    let mut fields: BTreeMap<String, String> = BTreeMap::new();

    let partition = items.top_level_simple_non_default(values);
    for flat in &partition.matched {
        if let Some(value) = values.get(flat.name) {
            fields.insert(field_name(flat.name), encode(flat.name, value)?);
        }
    }
    skipped.extend(partition.skipped);
    trace.extend(partition.trace);

    let properties = items.all_properties();
    for (name, schema) in &properties {
        if schema.read_only || schema.is_simple() {
            continue;
        }
        if let Some(value) = values.get(*name) {
            fields.insert(field_name(name), encode(name, value)?);
        }
    }
    for (name, value) in values {
        if !properties.contains_key(name.as_str()) {
            fields.insert(field_name(name), encode(name, value)?);
        }
    }

    if fields.is_empty() {
        return Ok("{}".to_string());
    }
    let rendered: Vec<String> = fields
        .into_iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect();
    Ok(format!("{{ {} }}", rendered.join(", ")))
}

/// Drop the value at `location` from a cloned subtree.
fn prune(value: &mut Value, location: &[&str]) {
    match location {
        [] => {}
        [leaf] => {
            if let Some(map) = value.as_object_mut() {
                map.remove(*leaf);
            }
        }
        [head, rest @ ..] => {
            if let Some(next) = value.as_object_mut().and_then(|m| m.get_mut(*head)) {
                prune(next, rest);
            }
        }
    }
}

fn encode(property: &str, value: &Value) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("encoding value for `{property}`"))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
