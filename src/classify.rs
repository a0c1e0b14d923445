//! Property classification: the partitions code generation is built from.
//!
//! Two axes. Shape: scalar-ish ("simple"), object, array, array-of-object.
//! Locality: at the node itself ("top level") or anywhere reachable through
//! nested objects ("nested", collected by the flattening traversal).
//!
//! Flattening never descends into arrays. An array of objects is one opaque
//! appendable property; its element schema is somebody else's constructor.
//!
//! Everything here is a pure read. Output order is fixed: sorted maps for
//! top-level categories, name-sorted lists for flattened ones.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::defaults::{CompareError, Comparison};
use crate::spec::Schema;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A leaf property surfaced by flattening, tagged with the path that
/// reconstructs its nested position. `location` ends with `name`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatSchema<'a> {
    pub name: &'a str,
    pub location: Vec<&'a str>,
    pub schema: &'a Schema,
}

/// Outcome of a default-aware pass: properties whose value differs from
/// their default, properties the comparator had no rule for, and the full
/// comparison trace for optional logging.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub matched: Vec<FlatSchema<'a>>,
    pub skipped: Vec<CompareError>,
    pub trace: Vec<Comparison>,
}

// ————————————————————————————————————————————————————————————————————————————
// FLATTENING
// ————————————————————————————————————————————————————————————————————————————

/// Recursively collect properties matching `predicate`.
///
/// Visits `all_properties` in sorted name order. A match is emitted with its
/// location and not descended into; a non-matching object property is
/// recursed into; anything else (arrays included) ends the branch. The
/// result is stable-sorted by leaf name, so equal names at different
/// locations keep their depth-first discovery order.
pub fn flatten<'a>(
    root: &'a Schema,
    mut predicate: impl FnMut(&str, &Schema) -> bool,
) -> Vec<FlatSchema<'a>> {
    let mut matched = Vec::new();
    let mut skipped = Vec::new();
    let mut prefix = Vec::new();
    walk(
        root,
        &mut prefix,
        &mut |_, name, schema| Ok(predicate(name, schema)),
        &mut matched,
        &mut skipped,
    );
    sort_by_leaf_name(&mut matched);
    matched
}

fn walk<'a, F>(
    node: &'a Schema,
    prefix: &mut Vec<&'a str>,
    predicate: &mut F,
    matched: &mut Vec<FlatSchema<'a>>,
    skipped: &mut Vec<CompareError>,
) where
    F: FnMut(&[&'a str], &'a str, &'a Schema) -> Result<bool, CompareError>,
{
    for (name, child) in node.sorted_properties() {
        match predicate(prefix, name, child) {
            Ok(true) => {
                let mut location = prefix.clone();
                location.push(name);
                matched.push(FlatSchema {
                    name,
                    location,
                    schema: child,
                });
            }
            Ok(false) => {
                if child.is_object() {
                    prefix.push(name);
                    walk(child, prefix, predicate, matched, skipped);
                    prefix.pop();
                }
            }
            // A property the comparator cannot decide is reported, not
            // guessed at. Only simple leaves can fail, so there is no
            // subtree to lose here.
            Err(error) => skipped.push(error),
        }
    }
}

fn sort_by_leaf_name(flats: &mut [FlatSchema]) {
    flats.sort_by(|a, b| a.name.cmp(b.name));
}

// ————————————————————————————————————————————————————————————————————————————
// CATEGORIES
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Constructor arguments: everything except objects and arrays of
    /// objects.
    pub fn top_level_simple(&self) -> BTreeMap<&str, &Schema> {
        self.top_level(Schema::is_simple)
    }

    /// Object-typed properties; each gets a setter on its parent.
    pub fn top_level_objects(&self) -> BTreeMap<&str, &Schema> {
        self.top_level(Schema::is_object)
    }

    /// Array-typed properties of any element type; each gets an appender.
    pub fn top_level_arrays(&self) -> BTreeMap<&str, &Schema> {
        self.top_level(Schema::is_array)
    }

    /// Arrays of objects: appenders whose elements are composite values.
    pub fn top_level_object_arrays(&self) -> BTreeMap<&str, &Schema> {
        self.top_level(Schema::is_object_array)
    }

    fn top_level(&self, shape: impl Fn(&Schema) -> bool) -> BTreeMap<&str, &Schema> {
        self.all_properties()
            .into_iter()
            .filter(|(_, schema)| !schema.read_only && shape(schema))
            .collect()
    }

    /// Read-only properties carrying a default (explicit null included), at
    /// any reachable depth. Generated code assigns these automatically
    /// instead of exposing them as arguments.
    pub fn read_only_defaults(&self) -> Vec<FlatSchema<'_>> {
        flatten(self, |_, schema| schema.read_only && schema.has_default())
    }

    /// Simple properties at any reachable depth: the argument list for a
    /// setter that writes through nested objects.
    pub fn nested_simple(&self) -> Vec<FlatSchema<'_>> {
        flatten(self, |_, schema| !schema.read_only && schema.is_simple())
    }

    /// Arrays of objects at any reachable depth: nested appenders.
    pub fn nested_object_arrays(&self) -> Vec<FlatSchema<'_>> {
        flatten(self, |_, schema| !schema.read_only && schema.is_object_array())
    }

    /// Constructor arguments whose value in `values` differs from the
    /// declared default. Only these need to appear in a generated
    /// construction call.
    pub fn top_level_simple_non_default<'a>(&'a self, values: &Map<String, Value>) -> Partition<'a> {
        let mut partition = Partition::default();
        for (name, schema) in self.sorted_properties() {
            if schema.read_only || !schema.is_simple() {
                continue;
            }
            match schema.is_default(name, values.get(name)) {
                Ok(comparison) => {
                    if !comparison.is_default {
                        partition.matched.push(FlatSchema {
                            name,
                            location: vec![name],
                            schema,
                        });
                    }
                    partition.trace.push(comparison);
                }
                Err(error) => partition.skipped.push(error),
            }
        }
        partition
    }

    /// Simple properties at any reachable depth whose value in `values`
    /// differs from the declared default. Each candidate is read at the
    /// property's own nested position by walking `values` along the
    /// location.
    pub fn nested_simple_non_default<'a>(&'a self, values: &Map<String, Value>) -> Partition<'a> {
        let mut matched = Vec::new();
        let mut skipped = Vec::new();
        let mut trace = Vec::new();
        let mut prefix = Vec::new();
        walk(
            self,
            &mut prefix,
            &mut |prefix, name, schema| {
                if schema.read_only || !schema.is_simple() {
                    return Ok(false);
                }
                // errors and traces name the full path; a bare leaf name is
                // useless in a thousand-property schema
                let property = dotted(prefix, name);
                let comparison = schema.is_default(&property, lookup(values, prefix, name))?;
                let differs = !comparison.is_default;
                trace.push(comparison);
                Ok(differs)
            },
            &mut matched,
            &mut skipped,
        );
        sort_by_leaf_name(&mut matched);
        Partition {
            matched,
            skipped,
            trace,
        }
    }
}

/// Read the value at a full location path, leaf included.
pub(crate) fn value_at<'v>(values: &'v Map<String, Value>, location: &[&str]) -> Option<&'v Value> {
    match location {
        [] => None,
        [prefix @ .., name] => lookup(values, prefix, name),
    }
}

/// Dotted path for diagnostics: `time.from`, not `from`.
fn dotted(prefix: &[&str], name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", prefix.join("."))
    }
}

/// Candidate value for a nested property: follow the location prefix through
/// intermediate objects, then read the leaf. A missing or non-object
/// ancestor means the property is absent.
fn lookup<'v>(values: &'v Map<String, Value>, prefix: &[&str], name: &str) -> Option<&'v Value> {
    let mut scope = values;
    for segment in prefix {
        scope = scope.get(*segment)?.as_object()?;
    }
    scope.get(name)
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

    fn values(src: serde_json::Value) -> Map<String, Value> {
        src.as_object().unwrap().clone()
    }

    fn panel() -> Schema {
        schema(json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "id": { "type": "integer", "readOnly": true, "default": 0 },
                "targets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "expr": { "type": "string" } }
                    }
                }
            }
        }))
    }

    #[test]
    fn panel_partitions_as_expected() {
        let panel = panel();

        let simple: Vec<&str> = panel.top_level_simple().into_keys().collect();
        assert_eq!(simple, vec!["title"]);

        let object_arrays: Vec<&str> = panel.top_level_object_arrays().into_keys().collect();
        assert_eq!(object_arrays, vec!["targets"]);

        let read_only = panel.read_only_defaults();
        assert_eq!(read_only.len(), 1);
        assert_eq!(read_only[0].name, "id");
        assert_eq!(read_only[0].location, vec!["id"]);

        // expr sits inside the array's element schema and stays invisible
        let nested: Vec<&str> = panel.nested_simple().iter().map(|f| f.name).collect();
        assert_eq!(nested, vec!["title"]);
    }

    #[test]
    fn flatten_never_crosses_arrays() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "object",
                    "properties": {
                        "b": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": { "c": { "type": "string" } }
                            }
                        }
                    }
                }
            }
        }));
        // `b` is an array of objects, so it is not simple, and `c` is
        // unreachable behind it
        assert!(root.nested_simple().is_empty());
        let arrays = root.nested_object_arrays();
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].location, vec!["a", "b"]);
    }

    #[test]
    fn flatten_output_is_sorted_by_leaf_name() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "zeta": { "type": "string" },
                "alpha": { "type": "string" },
                "mu": { "type": "string" }
            }
        }));
        let names: Vec<&str> = root.nested_simple().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn equal_leaf_names_keep_discovery_order() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "second": { "type": "object", "properties": { "x": { "type": "integer" } } },
                "first": { "type": "object", "properties": { "x": { "type": "integer" } } }
            }
        }));
        let locations: Vec<Vec<&str>> = root
            .nested_simple()
            .into_iter()
            .map(|f| f.location)
            .collect();
        // parents visit in sorted order, so first/x is discovered first and
        // the stable sort keeps it there
        assert_eq!(locations, vec![vec!["first", "x"], vec!["second", "x"]]);
    }

    #[test]
    fn matched_objects_are_not_descended_into() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "style": {
                    "type": "object",
                    "readOnly": true,
                    "default": { "mode": "dark" },
                    "properties": {
                        "mode": { "type": "string", "readOnly": true, "default": "dark" }
                    }
                }
            }
        }));
        let read_only = root.read_only_defaults();
        assert_eq!(read_only.len(), 1);
        assert_eq!(read_only[0].location, vec!["style"]);
    }

    #[test]
    fn all_of_properties_are_classified_too() {
        let root = schema(json!({
            "type": "object",
            "properties": { "own": { "type": "string" } },
            "allOf": [
                { "properties": { "merged": { "type": "string" } } }
            ]
        }));
        let names: Vec<&str> = root.top_level_simple().into_keys().collect();
        assert_eq!(names, vec!["merged", "own"]);
    }

    #[test]
    fn read_only_defaults_include_explicit_null() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "uid": { "type": "string", "readOnly": true, "default": null },
                "rev": { "type": "integer", "readOnly": true }
            }
        }));
        let names: Vec<&str> = root.read_only_defaults().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["uid"]);
    }

    #[test]
    fn classification_is_idempotent() {
        let panel = panel();
        let first = serde_json::to_string(&panel.nested_simple()).unwrap();
        let second = serde_json::to_string(&panel.nested_simple()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn top_level_non_default_elides_defaulted_values() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "editable": { "type": "boolean", "default": true },
                "style": { "type": "string", "default": "dark" }
            }
        }));
        let partition = root.top_level_simple_non_default(&values(json!({
            "title": "Overview",
            "editable": true,
            "style": "light"
        })));
        let names: Vec<&str> = partition.matched.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["style", "title"]);
        assert!(partition.skipped.is_empty());
        assert_eq!(partition.trace.len(), 3);
    }

    #[test]
    fn nested_non_default_reads_candidates_at_their_location() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "time": {
                    "type": "object",
                    "properties": {
                        "from": { "type": "string", "default": "now-6h" },
                        "to": { "type": "string", "default": "now" }
                    }
                }
            }
        }));
        let partition = root.nested_simple_non_default(&values(json!({
            "time": { "from": "now-12h", "to": "now" }
        })));
        let locations: Vec<Vec<&str>> = partition
            .matched
            .iter()
            .map(|f| f.location.clone())
            .collect();
        assert_eq!(locations, vec![vec!["time", "from"]]);
    }

    #[test]
    fn nested_diagnostics_name_the_full_path() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "time": {
                    "type": "object",
                    "properties": {
                        "from": { "type": "string", "default": "now-6h" }
                    }
                }
            }
        }));
        let partition = root.nested_simple_non_default(&values(json!({
            "time": { "from": 7 }
        })));
        assert_eq!(partition.skipped.len(), 1);
        assert!(partition.skipped[0].to_string().contains("time.from"));
    }

    #[test]
    fn undecidable_comparisons_are_reported_not_guessed() {
        let root = schema(json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": "x" }
            }
        }));
        let partition = root.top_level_simple_non_default(&values(json!({ "limit": 7 })));
        assert!(partition.matched.is_empty());
        assert_eq!(partition.skipped.len(), 1);
        assert!(partition.skipped[0].to_string().contains("limit"));
    }
}
