//! Binding configuration.
//!
//! Every name the engine looks for in a tree (descriptor attribute, index
//! stamp, event kinds) lives here so that hosts with other conventions can
//! override them. Defaults match the `data-model` markup.
//!
//! With the `config-file` feature, a [`BindingConfig`] can be loaded from a
//! TOML document; missing keys fall back to the defaults:
//!
//! ```toml
//! attribute = "data-bind"
//! reverse_properties = ["checked", "value"]
//! ```

/// Names and policies used while binding a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default, deny_unknown_fields))]
pub struct BindingConfig {
    /// Attribute carrying binding descriptors.
    pub attribute: String,
    /// Attribute stamped on rendered items with their collection index.
    pub index_attribute: String,
    /// Event kind that triggers write-back from a node into the store.
    pub change_event: String,
    /// Event kind intercepted by bound forms.
    pub submit_event: String,
    /// Renderer id used when a collection marker names none.
    pub default_renderer: String,
    /// Node properties that write back when bound without a registered
    /// reaction.
    pub reverse_properties: Vec<String>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            attribute: "data-model".to_owned(),
            index_attribute: "data-model_id".to_owned(),
            change_event: "change".to_owned(),
            submit_event: "submit".to_owned(),
            default_renderer: "default".to_owned(),
            reverse_properties: ["checked", "value", "selected"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Configuration rejected at load time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "config-file")]
    #[error("invalid binding config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
    #[error("`attribute` and `index_attribute` must differ (both are {0:?})")]
    AttributeClash(String),
}

impl BindingConfig {
    /// Parse a TOML document and validate it.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every name is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("attribute", &self.attribute),
            ("index_attribute", &self.index_attribute),
            ("change_event", &self.change_event),
            ("submit_event", &self.submit_event),
            ("default_renderer", &self.default_renderer),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty { field });
            }
        }
        if self.attribute == self.index_attribute {
            return Err(ConfigError::AttributeClash(self.attribute.clone()));
        }
        Ok(())
    }

    /// Whether writing `property` back into the store is allowed for
    /// unregistered reactions.
    #[must_use]
    pub fn is_reverse_property(&self, property: &str) -> bool {
        self.reverse_properties.iter().any(|p| p == property)
    }
}
