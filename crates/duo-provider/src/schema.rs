//! Declarative resource schemas.
//!
//! A schema lists every attribute of a resource type with its type, whether
//! it is declared or computed, and whether changing it forces the resource to
//! be replaced. It is used to validate attribute maps at the boundary and to
//! work out which attributes changed between prior state and a new
//! declaration.

use crate::error::{ProviderError, Result};
use serde::Serialize;
use serde_json::Value;

/// Attribute value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Integer,
    List,
}

impl AttributeType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            AttributeType::String => value.is_string(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Integer => value.is_i64() || value.is_u64(),
            AttributeType::List => value.is_array(),
        }
    }
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be declared.
    Required,
    /// May be declared.
    Optional,
    /// May be declared; when left out the remote default is kept.
    OptionalComputed,
    /// Only ever set from the remote side.
    Computed,
}

/// Schema of a single attribute.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub kind: AttributeType,
    pub presence: Presence,
    pub force_new: bool,
    pub sensitive: bool,
    pub description: &'static str,
    /// Values that may be declared. Empty means any value of `kind`.
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub allowed: &'static [&'static str],
}

impl AttributeSchema {
    fn new(name: &'static str, kind: AttributeType, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
            force_new: false,
            sensitive: false,
            description: "",
            allowed: &[],
        }
    }

    pub fn required(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Required)
    }

    pub fn optional(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Optional)
    }

    pub fn optional_computed(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::OptionalComputed)
    }

    pub fn computed(name: &'static str, kind: AttributeType) -> Self {
        Self::new(name, kind, Presence::Computed)
    }

    /// Changing this attribute replaces the resource.
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Restrict declared string values to `allowed`.
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn is_declared(&self) -> bool {
        self.presence != Presence::Computed
    }
}

/// Schema of a resource type.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceSchema {
    /// Start a schema. Every resource carries a computed `id`.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            attributes: vec![AttributeSchema::computed("id", AttributeType::String)
                .describe("Identifier of the resource")],
        }
    }

    pub fn with(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Validate a declared attribute map.
    pub fn validate(&self, attributes: &Value) -> Result<()> {
        let map = attributes
            .as_object()
            .ok_or_else(|| ProviderError::invalid(self.type_name, "attributes must be an object"))?;

        for (key, value) in map {
            let attribute = self.attribute(key).ok_or_else(|| {
                ProviderError::invalid(self.type_name, format!("unknown attribute '{}'", key))
            })?;

            if !attribute.is_declared() {
                return Err(ProviderError::invalid(
                    self.type_name,
                    format!("'{}' is computed and cannot be set", key),
                ));
            }

            if !value.is_null() && !attribute.kind.accepts(value) {
                return Err(ProviderError::invalid(
                    self.type_name,
                    format!("'{}' must be of type {:?}", key, attribute.kind),
                ));
            }

            if let Some(value) = value.as_str() {
                if !attribute.allowed.is_empty() && !attribute.allowed.contains(&value) {
                    return Err(ProviderError::invalid(
                        self.type_name,
                        format!(
                            "'{}' must be one of {}, got '{}'",
                            key,
                            attribute.allowed.join(", "),
                            value
                        ),
                    ));
                }
            }
        }

        for attribute in &self.attributes {
            if attribute.presence == Presence::Required
                && map.get(attribute.name).map_or(true, Value::is_null)
            {
                return Err(ProviderError::invalid(
                    self.type_name,
                    format!("'{}' is required", attribute.name),
                ));
            }
        }

        Ok(())
    }

    /// Declared attributes whose value differs between `prior` and `planned`.
    ///
    /// Missing and `null` are the same thing. An optional+computed attribute
    /// left out of `planned` never counts as changed.
    pub fn changed_attributes(&self, prior: &Value, planned: &Value) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.is_declared())
            .filter(|a| {
                let before = prior.get(a.name).unwrap_or(&Value::Null);
                let after = planned.get(a.name).unwrap_or(&Value::Null);
                if a.presence == Presence::OptionalComputed && after.is_null() {
                    return false;
                }
                before != after
            })
            .map(|a| a.name)
            .collect()
    }

    /// Changed attributes that can only be applied by replacement.
    pub fn replacement_fields(&self, changed: &[&'static str]) -> Vec<&'static str> {
        changed
            .iter()
            .copied()
            .filter(|name| self.attribute(name).is_some_and(|a| a.force_new))
            .collect()
    }

    pub fn requires_replacement(&self, changed: &[&'static str]) -> bool {
        !self.replacement_fields(changed).is_empty()
    }
}
