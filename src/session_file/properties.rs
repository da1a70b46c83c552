use flow_host::Attributes;
use serde_json::Value;

use super::SessionFile;
use crate::config::ReservedWritePolicy;
use crate::error::ScriptError;

/// Property name that reads the content size instead of an attribute.
pub const SIZE_PROPERTY: &str = "size";
/// Property name that reads the whole attribute map instead of an attribute.
pub const ATTRIBUTES_PROPERTY: &str = "attributes";

/// Result of a property read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Size(u64),
    Attributes(Attributes),
    Attribute(Option<String>),
}

impl Property {
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Size(size) => Value::from(size),
            Self::Attributes(attributes) => Value::Object(
                attributes
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
            Self::Attribute(Some(value)) => Value::String(value),
            Self::Attribute(None) => Value::Null,
        }
    }
}

/// String form a script value is stored under; `None` for null.
///
/// Strings are kept verbatim; every other value uses its compact JSON text.
#[must_use]
pub fn script_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

impl SessionFile<'_> {
    /// Reads a property: `size` and `attributes` are intercepted, anything else
    /// is an attribute lookup that yields `None` when unset.
    #[must_use]
    pub fn get_property(&self, key: &str) -> Property {
        match key {
            SIZE_PROPERTY => Property::Size(self.size()),
            ATTRIBUTES_PROPERTY => Property::Attributes(self.attributes().clone()),
            _ => Property::Attribute(self.get_attribute(key).map(str::to_string)),
        }
    }

    /// Writes a property: null removes the attribute, other values are stored
    /// as their string form.
    pub fn set_property(&mut self, key: &str, value: &Value) -> Result<(), ScriptError> {
        self.set_or_remove_attribute(key, script_string(value).as_deref())
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.flow_file.attribute(key)
    }

    pub fn put_attribute(&mut self, key: &str, value: &str) -> Result<&mut Self, ScriptError> {
        self.check_reserved_write(key)?;
        self.flow_file = self.session.put_attribute(&self.flow_file, key, value)?;
        Ok(self)
    }

    /// Removes `key` through the session even when the held snapshot lacks it;
    /// the host treats an unset key as a no-op.
    pub fn remove_attribute(&mut self, key: &str) -> Result<&mut Self, ScriptError> {
        self.flow_file = self.session.remove_attribute(&self.flow_file, key)?;
        Ok(self)
    }

    pub fn set_or_remove_attribute(
        &mut self,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), ScriptError> {
        match value {
            Some(value) => self.put_attribute(key, value).map(|_| ()),
            None => self.remove_attribute(key).map(|_| ()),
        }
    }

    pub fn put_all_attributes<I, K, V>(&mut self, attributes: I) -> Result<&mut Self, ScriptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in attributes {
            self.put_attribute(key.as_ref(), value.as_ref())?;
        }
        Ok(self)
    }

    pub fn remove_all_attributes<I, K>(&mut self, keys: I) -> Result<&mut Self, ScriptError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.remove_attribute(key.as_ref())?;
        }
        Ok(self)
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.flow_file.size()
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        self.flow_file.attributes()
    }

    fn check_reserved_write(&self, key: &str) -> Result<(), ScriptError> {
        if key != SIZE_PROPERTY && key != ATTRIBUTES_PROPERTY {
            return Ok(());
        }
        match self.reserved_writes {
            ReservedWritePolicy::Allow => Ok(()),
            ReservedWritePolicy::Warn => {
                tracing::warn!(
                    flow_file = self.flow_file.id(),
                    key,
                    "attribute shadowed by a reserved property name; reads will not see it"
                );
                Ok(())
            }
            ReservedWritePolicy::Reject => Err(ScriptError::ReservedAttribute {
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{script_string, Property};

    #[test]
    fn script_string_keeps_strings_verbatim() {
        assert_eq!(script_string(&json!("a \"b\"")), Some("a \"b\"".to_string()));
        assert_eq!(script_string(&json!("")), Some(String::new()));
    }

    #[test]
    fn script_string_renders_other_values_canonically() {
        assert_eq!(script_string(&json!(42)), Some("42".to_string()));
        assert_eq!(script_string(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(script_string(&json!(true)), Some("true".to_string()));
        assert_eq!(script_string(&json!([1, "x"])), Some("[1,\"x\"]".to_string()));
        assert_eq!(script_string(&json!({"k": 1})), Some("{\"k\":1}".to_string()));
        assert_eq!(script_string(&json!(null)), None);
    }

    #[test]
    fn property_values_map_to_script_values() {
        assert_eq!(Property::Size(7).into_value(), json!(7));
        assert_eq!(Property::Attribute(None).into_value(), json!(null));
        assert_eq!(
            Property::Attribute(Some("v".to_string())).into_value(),
            json!("v")
        );

        let attributes = [("a".to_string(), "1".to_string())].into_iter().collect();
        assert_eq!(
            Property::Attributes(attributes).into_value(),
            json!({"a": "1"})
        );
    }
}
