//! Schema builders for providers, resources, and data sources
//!
//! Schemas are declared with a small fluent API:
//!
//! ```ignore
//! SchemaBuilder::new()
//!     .attribute("id", AttributeBuilder::string("id").computed())
//!     .attribute("domain", AttributeBuilder::string("domain").required())
//!     .build_data_source(0)
//! ```

use crate::attribute_type::AttributeType;
use crate::provider::{DataSourceSchema, ProviderSchema, ResourceSchema};
use std::collections::HashMap;

/// A single configuration attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
}

/// Fluent builder for attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, r#type: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
            },
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, AttributeType::Number)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn string_list(name: &str) -> Self {
        Self::new(name, AttributeType::List(Box::new(AttributeType::String)))
    }

    pub fn object(name: &str, attrs: HashMap<String, AttributeType>) -> Self {
        Self::new(name, AttributeType::Object(attrs))
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Fluent builder for attribute collections
#[derive(Default)]
pub struct SchemaBuilder {
    attributes: HashMap<String, Attribute>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, builder: AttributeBuilder) -> Self {
        self.attributes.insert(name.to_string(), builder.build());
        self
    }

    pub fn build_provider(self, version: i64) -> ProviderSchema {
        ProviderSchema {
            version,
            attributes: self.attributes,
        }
    }

    pub fn build_resource(self, version: i64) -> ResourceSchema {
        ResourceSchema {
            version,
            attributes: self.attributes,
        }
    }

    pub fn build_data_source(self, version: i64) -> DataSourceSchema {
        DataSourceSchema {
            version,
            attributes: self.attributes,
        }
    }
}
