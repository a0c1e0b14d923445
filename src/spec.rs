//! Document model for the dashboarding object schema.
//!
//! An OpenAPI-flavored JSON document, already `$ref`-expanded by whoever
//! produced it. The tree is built once per run and only ever read after
//! that; every accessor here is a pure projection.
//!
//! Ordering rule: maps are parsed in document order (for fidelity), but any
//! iteration that feeds user-visible output goes through a sorted view so
//! generated artifacts are byte-stable across runs.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Top-level spec document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spec {
    #[serde(rename = "openapi", default)]
    pub version: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: IndexMap<String, Schema>,
}

/// The `type` keyword, restricted to the shapes the generator understands.
/// Anything else in the document fails at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number")]
    Number,
    /// `"type"` absent or empty, e.g. on `allOf` members.
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

/// One node of the recursive schema tree.
///
/// `default` distinguishes an absent keyword (`None`) from an explicit
/// `"default": null` (`Some(Value::Null)`); a read-only property with an
/// explicit null default is still default-bearing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "SchemaType::is_unspecified"
    )]
    pub type_: SchemaType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
}

/// Malformed schema tree. Always aborts the run: classifying a broken tree
/// risks silently wrong generated code.
#[derive(Debug, thiserror::Error)]
pub enum StructuralError {
    #[error("{location}: array schema is missing `items`")]
    ArrayWithoutItems { location: String },
    #[error("{location}: `items` given on non-array schema (type `{}`)", .type_.as_str())]
    ItemsOnNonArray { location: String, type_: SchemaType },
    #[error("{location}: `properties` given on non-object schema (type `{}`)", .type_.as_str())]
    PropertiesOnNonObject { location: String, type_: SchemaType },
}

/// A declared default that cannot be rendered as canonical JSON.
#[derive(Debug, thiserror::Error)]
#[error("cannot encode default value as JSON: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Unspecified => "",
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }
}

impl Spec {
    /// Check the tree invariants for every schema, in sorted name order so
    /// the first reported violation is stable for a given document.
    pub fn validate(&self) -> Result<(), StructuralError> {
        let mut names: Vec<&String> = self.components.schemas.keys().collect();
        names.sort();
        for name in names {
            self.components.schemas[name.as_str()].validate_at(name)?;
        }
        Ok(())
    }
}

impl Schema {
    /// Effective property set: own `properties` merged with every `allOf`
    /// member's, in document order. Later `allOf` members override earlier
    /// ones and the node's own entries on name collision.
    pub fn all_properties(&self) -> IndexMap<&str, &Schema> {
        let mut merged: IndexMap<&str, &Schema> = self
            .properties
            .iter()
            .map(|(name, schema)| (name.as_str(), schema))
            .collect();
        for member in &self.all_of {
            for (name, schema) in &member.properties {
                merged.insert(name.as_str(), schema);
            }
        }
        merged
    }

    /// `all_properties` as a sorted list. Every traversal that feeds
    /// generated output iterates this view, never the raw map.
    pub fn sorted_properties(&self) -> Vec<(&str, &Schema)> {
        let mut properties: Vec<(&str, &Schema)> = self.all_properties().into_iter().collect();
        properties.sort_by(|a, b| a.0.cmp(b.0));
        properties
    }

    /// `title` if set, else the property name. A title is assumed to carry
    /// more meaning than the raw name, so it wins for naming generated
    /// arguments and functions.
    pub fn human_name<'a>(&'a self, property_name: &'a str) -> &'a str {
        if self.title.is_empty() {
            property_name
        } else {
            &self.title
        }
    }

    /// Canonical compact-JSON encoding of the declared default (`null` when
    /// absent), for emission as a literal in generated code.
    pub fn default_json(&self) -> Result<String, EncodeError> {
        let value = self.default.as_ref().unwrap_or(&Value::Null);
        Ok(serde_json::to_string(value)?)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_object(&self) -> bool {
        self.type_ == SchemaType::Object
    }

    pub fn is_array(&self) -> bool {
        self.type_ == SchemaType::Array
    }

    /// Array whose elements are object-typed: an appendable composite.
    pub fn is_object_array(&self) -> bool {
        self.is_array() && self.items.as_deref().is_some_and(Schema::is_object)
    }

    /// Anything a constructor can take verbatim: neither an object nor an
    /// array of objects. Scalar arrays count as simple.
    pub fn is_simple(&self) -> bool {
        !self.is_object() && !self.is_object_array()
    }

    fn validate_at(&self, location: &str) -> Result<(), StructuralError> {
        match self.type_ {
            SchemaType::Array => {
                if self.items.is_none() {
                    return Err(StructuralError::ArrayWithoutItems {
                        location: location.to_string(),
                    });
                }
            }
            type_ => {
                if self.items.is_some() {
                    return Err(StructuralError::ItemsOnNonArray {
                        location: location.to_string(),
                        type_,
                    });
                }
                // Own properties are fine on `object` and on `Unspecified`
                // (the usual shape of an `allOf` member).
                if !self.properties.is_empty()
                    && !matches!(type_, SchemaType::Object | SchemaType::Unspecified)
                {
                    return Err(StructuralError::PropertiesOnNonObject {
                        location: location.to_string(),
                        type_,
                    });
                }
            }
        }
        if let Some(items) = &self.items {
            items.validate_at(&format!("{location}.items"))?;
        }
        for (name, child) in &self.properties {
            child.validate_at(&format!("{location}.{name}"))?;
        }
        for (i, member) in self.all_of.iter().enumerate() {
            member.validate_at(&format!("{location}.allOf[{i}]"))?;
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Treat any present value, including an explicit null, as `Some`. The
/// derived behavior would fold `"default": null` into `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
