//! The node value schema declared by a computation.

use crate::error::{Error, Result};
use derive_more::Display;
use std::collections::HashSet;

/// The type of one node value field.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    #[display(fmt = "DOUBLE")]
    Double,
    #[display(fmt = "LONG")]
    Long,
    #[display(fmt = "DOUBLE_ARRAY")]
    DoubleArray,
    #[display(fmt = "LONG_ARRAY")]
    LongArray,
}

/// Private fields are scratch space of the computation and are not part of
/// [`PregelSchema::public_keys`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    key: String,
    value_type: ValueType,
    visibility: Visibility,
}

impl Element {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PregelSchema {
    elements: Vec<Element>,
}

impl PregelSchema {
    pub fn builder() -> PregelSchemaBuilder {
        PregelSchemaBuilder::default()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn public_keys(&self) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .filter(|e| e.visibility == Visibility::Public)
            .map(|e| e.key())
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.key == key)
    }

    /// Rejects schemas without fields, with empty keys or with duplicate keys.
    pub fn validate(&self) -> Result<()> {
        if self.elements.is_empty() {
            return Err(Error::InvalidSchema(String::from(
                "schema must declare at least one field",
            )));
        }
        let mut keys = HashSet::with_capacity(self.elements.len());
        for element in &self.elements {
            if element.key.is_empty() {
                return Err(Error::InvalidSchema(String::from("empty field key")));
            }
            if !keys.insert(element.key.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field key `{}`",
                    element.key
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PregelSchemaBuilder {
    elements: Vec<Element>,
}

impl PregelSchemaBuilder {
    pub fn add(self, key: &str, value_type: ValueType) -> Self {
        self.add_with_visibility(key, value_type, Visibility::Public)
    }

    pub fn add_with_visibility(
        mut self,
        key: &str,
        value_type: ValueType,
        visibility: Visibility,
    ) -> Self {
        self.elements.push(Element {
            key: String::from(key),
            value_type,
            visibility,
        });
        self
    }

    pub fn build(self) -> PregelSchema {
        PregelSchema {
            elements: self.elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_keys() {
        let schema = PregelSchema::builder()
            .add("rank", ValueType::Double)
            .add_with_visibility("delta", ValueType::Double, Visibility::Private)
            .add("path", ValueType::LongArray)
            .build();
        assert_eq!(schema.public_keys().collect::<Vec<_>>(), ["rank", "path"]);
        assert_eq!(schema.position("delta"), Some(1));
        assert_eq!(schema.position("missing"), None);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(PregelSchema::builder().build().validate().is_err());
        assert!(PregelSchema::builder()
            .add("", ValueType::Long)
            .build()
            .validate()
            .is_err());
        assert!(PregelSchema::builder()
            .add("a", ValueType::Long)
            .add("a", ValueType::Double)
            .build()
            .validate()
            .is_err());
    }
}
