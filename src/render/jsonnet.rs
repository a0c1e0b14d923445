//! jsonnet builder emission.
//!
//! One module per schema: `new(...)` over the scalar properties, `with…`
//! setters reaching through nested objects, `add…` appenders for arrays.
//! Setters patch additively (`+:`) so chained calls merge instead of
//! clobbering sibling fields.
//!
//! The same builder plan drives module emission, the generated docs, and
//! instance conversion, so accessor and parameter names can never drift
//! apart between them.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use anyhow::Result;

use crate::classify::FlatSchema;
use crate::render::{Language, camelize_up, field_name, param_name, parameter_names, singularize};
use crate::spec::{Schema, Spec};

// ————————————————————————————————————————————————————————————————————————————
// PLAN
// ————————————————————————————————————————————————————————————————————————————

/// One generated function parameter, tied back to the property it fills.
pub(crate) struct Param<'a> {
    pub name: String,
    /// `name` or `name=<default literal>`.
    pub declaration: String,
    pub flat: FlatSchema<'a>,
}

pub(crate) struct Setter<'a> {
    pub accessor: String,
    /// Top-level object property the setter patches.
    pub target: &'a str,
    pub object: &'a Schema,
    /// Empty when the object has no settable leaves; the setter then takes
    /// the whole value instead.
    pub params: Vec<Param<'a>>,
}

pub(crate) struct Appender<'a> {
    pub accessor: String,
    pub param: String,
    pub flat: FlatSchema<'a>,
}

/// Everything a builder module exposes for one schema.
pub(crate) struct Builder<'a> {
    pub constructor_params: Vec<Param<'a>>,
    pub read_only_defaults: Vec<(FlatSchema<'a>, String)>,
    pub setters: Vec<Setter<'a>>,
    pub appenders: Vec<Appender<'a>>,
}

pub(crate) fn plan(schema: &Schema) -> Result<Builder<'_>> {
    let constructor_flats: Vec<FlatSchema> = schema
        .top_level_simple()
        .into_iter()
        .map(|(name, schema)| FlatSchema {
            name,
            location: vec![name],
            schema,
        })
        .collect();
    let constructor_params = declare(constructor_flats)?;

    let read_only_defaults = schema
        .read_only_defaults()
        .into_iter()
        .map(|flat| {
            let literal = flat.schema.default_json()?;
            Ok((flat, literal))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut used = BTreeSet::new();
    let mut setters = Vec::new();
    for (name, object) in schema.top_level_objects() {
        let accessor = unique(
            &mut used,
            format!("with{}", camelize_up(object.human_name(name))),
            || format!("with{}", camelize_up(name)),
        );
        setters.push(Setter {
            accessor,
            target: name,
            object,
            params: declare(object.nested_simple())?,
        });
    }

    let mut appender_flats: Vec<FlatSchema> = schema
        .top_level_arrays()
        .into_iter()
        .map(|(name, schema)| FlatSchema {
            name,
            location: vec![name],
            schema,
        })
        .collect();
    appender_flats.extend(
        schema
            .nested_object_arrays()
            .into_iter()
            .filter(|flat| flat.location.len() > 1),
    );
    appender_flats.sort_by(|a, b| a.name.cmp(b.name).then_with(|| a.location.cmp(&b.location)));

    let mut appenders = Vec::new();
    for flat in appender_flats {
        let singular = singularize(flat.schema.human_name(flat.name));
        let accessor = unique(
            &mut used,
            format!("add{}", camelize_up(&singular)),
            || format!("add{}", camelize_up(&singularize(&flat.location.join(" ")))),
        );
        appenders.push(Appender {
            accessor,
            param: param_name(&singular),
            flat,
        });
    }
    appenders.sort_by(|a, b| a.accessor.cmp(&b.accessor));

    Ok(Builder {
        constructor_params,
        read_only_defaults,
        setters,
        appenders,
    })
}

fn declare(flats: Vec<FlatSchema>) -> Result<Vec<Param>> {
    let names = parameter_names(&flats);
    flats
        .into_iter()
        .zip(names)
        .map(|(flat, name)| {
            let declaration = if flat.schema.has_default() {
                format!("{name}={}", flat.schema.default_json()?)
            } else {
                name.clone()
            };
            Ok(Param {
                name,
                declaration,
                flat,
            })
        })
        .collect()
}

fn unique(used: &mut BTreeSet<String>, primary: String, fallback: impl FnOnce() -> String) -> String {
    if used.insert(primary.clone()) {
        return primary;
    }
    let fallback = fallback();
    used.insert(fallback.clone());
    fallback
}

// ————————————————————————————————————————————————————————————————————————————
// MODULE EMISSION
// ————————————————————————————————————————————————————————————————————————————

/// Render the full builder module for one schema.
pub fn builder_module(schema: &Schema) -> Result<String> {
    let builder = plan(schema)?;
    let mut out = Emitter::default();
    if !schema.description.is_empty() {
        out.line(&format!("// {}", schema.description));
    }
    out.line("{");
    out.indent();

    // constructor
    let declarations: Vec<&str> = builder
        .constructor_params
        .iter()
        .map(|p| p.declaration.as_str())
        .collect();
    out.line(&format!("new({}):: {{", declarations.join(", ")));
    out.indent();
    let mut fields = FieldTree::default();
    for param in &builder.constructor_params {
        fields.insert(&param.flat.location, param.name.clone());
    }
    for (flat, literal) in &builder.read_only_defaults {
        fields.insert(&flat.location, literal.clone());
    }
    fields.emit(&mut out, "", "");
    out.dedent();
    out.line("},");

    // setters
    for setter in &builder.setters {
        if setter.params.is_empty() {
            let param = param_name(setter.target);
            out.line(&format!("{}({param}):: self + {{", setter.accessor));
            out.indent();
            out.line(&format!("{}: {param},", field_name(setter.target)));
            out.dedent();
            out.line("},");
            continue;
        }
        let declarations: Vec<&str> = setter.params.iter().map(|p| p.declaration.as_str()).collect();
        out.line(&format!("{}({}):: self + {{", setter.accessor, declarations.join(", ")));
        out.indent();
        let mut fields = FieldTree::default();
        for param in &setter.params {
            let mut location = vec![setter.target];
            location.extend(&param.flat.location);
            fields.insert(&location, param.name.clone());
        }
        fields.emit(&mut out, "+", "");
        out.dedent();
        out.line("},");
    }

    // appenders
    for appender in &builder.appenders {
        out.line(&format!("{}({}):: self + {{", appender.accessor, appender.param));
        out.indent();
        let mut fields = FieldTree::default();
        fields.insert(&appender.flat.location, format!("[{}]", appender.param));
        fields.emit(&mut out, "+", "+");
        out.dedent();
        out.line("},");
    }

    out.dedent();
    out.line("}");
    Ok(out.into_string())
}

/// The import index tying every builder module together.
pub fn index_module(names: &[&str], language: Language) -> String {
    let mut out = Emitter::default();
    out.line("{");
    out.indent();
    for name in names {
        out.line(&format!(
            "{}: import '{}',",
            field_name(&language.object_name(name)),
            language.file_name(name)
        ));
    }
    out.dedent();
    out.line("}");
    out.into_string()
}

/// Markdown reference for the generated library.
pub fn docs(spec: &Spec, names: &[&str], language: Language) -> Result<String> {
    let mut out = String::new();
    out.push_str("# Generated builders\n");
    if !spec.info.title.is_empty() {
        out.push_str(&format!(
            "\nObject builders for {} {}.\n",
            spec.info.title, spec.info.version
        ));
    }
    for name in names {
        let schema = &spec.components.schemas[*name];
        let builder = plan(schema)?;
        out.push_str(&format!("\n## {}\n\n", language.object_name(name)));
        if !schema.description.is_empty() {
            out.push_str(&format!("{}\n\n", schema.description));
        }
        let declarations: Vec<&str> = builder
            .constructor_params
            .iter()
            .map(|p| p.declaration.as_str())
            .collect();
        out.push_str(&format!("- `new({})`\n", declarations.join(", ")));
        for setter in &builder.setters {
            let declarations: Vec<&str> =
                setter.params.iter().map(|p| p.declaration.as_str()).collect();
            if declarations.is_empty() {
                out.push_str(&format!("- `{}({})`\n", setter.accessor, param_name(setter.target)));
            } else {
                out.push_str(&format!("- `{}({})`\n", setter.accessor, declarations.join(", ")));
            }
        }
        for appender in &builder.appenders {
            out.push_str(&format!("- `{}({})`\n", appender.accessor, appender.param));
        }
    }
    Ok(out)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth -= 1;
    }

    fn into_string(self) -> String {
        self.out
    }
}

/// Nested field assignments, merged from location paths so sibling leaves
/// share one enclosing object literal.
#[derive(Default)]
struct FieldTree<'a> {
    children: BTreeMap<&'a str, FieldTree<'a>>,
    value: Option<String>,
}

impl<'a> FieldTree<'a> {
    fn insert(&mut self, location: &[&'a str], value: String) {
        match location {
            [] => self.value = Some(value),
            [head, rest @ ..] => self.children.entry(head).or_default().insert(rest, value),
        }
    }

    /// `nest_op`/`leaf_op` select plain (`:`) or additive (`+:`) assignment
    /// for intermediate objects and leaves respectively.
    fn emit(&self, out: &mut Emitter, nest_op: &str, leaf_op: &str) {
        for (name, node) in &self.children {
            if let Some(value) = &node.value {
                out.line(&format!("{}{leaf_op}: {value},", field_name(name)));
            } else {
                out.line(&format!("{}{nest_op}: {{", field_name(name)));
                out.indent();
                node.emit(out, nest_op, leaf_op);
                out.dedent();
                out.line("},");
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(src: serde_json::Value) -> Schema {
        serde_json::from_value(src).unwrap()
    }

    fn dashboard() -> Schema {
        schema(json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "title": "Dashboard title" },
                "editable": { "type": "boolean", "default": true },
                "id": { "type": "integer", "readOnly": true, "default": 0 },
                "time": {
                    "type": "object",
                    "properties": {
                        "from": { "type": "string", "default": "now-6h" },
                        "to": { "type": "string", "default": "now" }
                    }
                },
                "panels": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "type": { "type": "string" } }
                    }
                }
            }
        }))
    }

    #[test]
    fn builder_module_emits_constructor_setters_and_appenders() {
        let expected = r#"{
  new(editable=true, dashboardTitle):: {
    editable: editable,
    id: 0,
    title: dashboardTitle,
  },
  withTime(from="now-6h", to="now"):: self + {
    time+: {
      from: from,
      to: to,
    },
  },
  addPanel(panel):: self + {
    panels+: [panel],
  },
}
"#;
        assert_eq!(builder_module(&dashboard()).unwrap(), expected);
    }

    #[test]
    fn rendering_is_byte_stable() {
        let first = builder_module(&dashboard()).unwrap();
        let second = builder_module(&dashboard()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_read_only_defaults_are_assigned_in_the_constructor() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "style": {
                    "type": "object",
                    "properties": {
                        "mode": { "type": "string", "readOnly": true, "default": "dark" }
                    }
                }
            }
        }));
        let text = builder_module(&s).unwrap();
        assert!(text.contains("style: {\n      mode: \"dark\",\n    },"), "{text}");
    }

    #[test]
    fn objects_without_settable_leaves_get_whole_value_setters() {
        let s = schema(json!({
            "type": "object",
            "properties": {
                "annotations": {
                    "type": "object",
                    "properties": {
                        "list": {
                            "type": "array",
                            "items": { "type": "object", "properties": {} }
                        }
                    }
                }
            }
        }));
        let text = builder_module(&s).unwrap();
        assert!(text.contains("withAnnotations(annotations):: self + {"), "{text}");
        // the nested array of objects still gets an appender
        assert!(text.contains("addList(list):: self + {"), "{text}");
        assert!(text.contains("annotations+: {\n      list+: [list],"), "{text}");
    }

    #[test]
    fn index_module_imports_every_schema() {
        let text = index_module(&["Dashboard", "Panel"], Language::Jsonnet);
        let expected = "{\n  dashboard: import 'dashboard.libsonnet',\n  panel: import 'panel.libsonnet',\n}\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn docs_list_every_accessor() {
        let spec: Spec = serde_json::from_value(json!({
            "openapi": "3.0.0",
            "info": { "title": "Dashboard schema", "version": "7.0" },
            "components": { "schemas": { "Dashboard": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "panels": {
                        "type": "array",
                        "items": { "type": "object", "properties": {} }
                    }
                }
            }}}
        }))
        .unwrap();
        let text = docs(&spec, &["Dashboard"], Language::Jsonnet).unwrap();
        assert!(text.contains("## dashboard"), "{text}");
        assert!(text.contains("- `new(title)`"), "{text}");
        assert!(text.contains("- `addPanel(panel)`"), "{text}");
    }
}
