//! Resource and data source schemas

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Diagnostic;
use crate::state::DynamicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Number,
    StringList,
}

impl AttributeType {
    fn name(self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Number => "number",
            AttributeType::StringList => "list of strings",
        }
    }

    /// Null matches every type
    pub fn matches(self, value: &DynamicValue) -> bool {
        match (self, value) {
            (_, DynamicValue::Null) => true,
            (AttributeType::String, DynamicValue::String(_)) => true,
            (AttributeType::Bool, DynamicValue::Bool(_)) => true,
            (AttributeType::Number, DynamicValue::Number(_)) => true,
            (AttributeType::StringList, DynamicValue::List(items)) => {
                items.iter().all(|item| matches!(item, DynamicValue::String(_)))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Changing the value replaces the resource
    pub force_new: bool,
}

impl Attribute {
    fn base(ty: AttributeType) -> Self {
        Self {
            ty,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
        }
    }

    pub fn required(ty: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::base(ty)
        }
    }

    pub fn optional(ty: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::base(ty)
        }
    }

    pub fn computed(ty: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::base(ty)
        }
    }

    pub fn optional_computed(ty: AttributeType) -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::base(ty)
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub version: i64,
    pub description: String,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// New schema with the computed `id` attribute already declared
    pub fn new(description: &str) -> Self {
        Self {
            version: 0,
            description: description.to_string(),
            attributes: BTreeMap::new(),
        }
        .attribute(
            "id",
            Attribute::computed(AttributeType::String).describe("Identifier of the entity"),
        )
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Check a configuration object against the schema
    pub fn validate(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let empty = Default::default();
        let values = config.as_map().unwrap_or(&empty);

        for (name, attribute) in &self.attributes {
            let value = values.get(name).unwrap_or(&DynamicValue::Null);

            if attribute.required && value.is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", name),
                    )
                    .with_attribute(name),
                );
                continue;
            }

            if attribute.computed && !attribute.optional && !attribute.required && !value.is_null() && name != "id" {
                diagnostics.push(
                    Diagnostic::error(
                        "Value for unconfigurable attribute",
                        format!("Can't configure a value for \"{}\": its value will be decided automatically.", name),
                    )
                    .with_attribute(name),
                );
                continue;
            }

            if !attribute.ty.matches(value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!("Attribute \"{}\" must be a {}.", name, attribute.ty.name()),
                    )
                    .with_attribute(name),
                );
            }
        }

        for name in values.keys() {
            if !self.contains(name) {
                diagnostics.push(
                    Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named \"{}\" is not expected here.", name),
                    )
                    .with_attribute(name),
                );
            }
        }

        diagnostics
    }

    /// Force-new attributes whose value differs between prior state and proposal
    pub fn requires_replace(&self, prior: &DynamicValue, proposed: &DynamicValue) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attribute)| attribute.force_new)
            .filter(|(name, _)| {
                let before = prior.get(name).unwrap_or(&DynamicValue::Null);
                let after = proposed.get(name).unwrap_or(&DynamicValue::Null);
                before != after
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}
