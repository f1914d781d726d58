//! Domain intents recorded while offline.
//!
//! These are the typed inputs of the mutation factory. Once validated they are
//! flattened into the opaque JSON payload the queue stores.

use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::mutation::MutationType;

/// Fields of a new list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            unit: None,
            category: None,
            notes: None,
        }
    }

    pub fn with_quantity(mut self, quantity: f64, unit: impl Into<String>) -> Self {
        self.quantity = Some(quantity);
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A user intent captured while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationIntent {
    #[serde(rename_all = "camelCase")]
    Add { list_id: String, item: ItemDraft },

    /// `changes` is a partial item object; only the listed fields change.
    #[serde(rename_all = "camelCase")]
    Update {
        item_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        list_id: Option<String>,
        changes: serde_json::Value,
    },

    #[serde(rename_all = "camelCase")]
    MarkGotten { item_id: String, gotten: bool },

    #[serde(rename_all = "camelCase")]
    Delete { item_id: String },
}

impl MutationIntent {
    pub fn mutation_type(&self) -> MutationType {
        match self {
            Self::Add { .. } => MutationType::Add,
            Self::Update { .. } => MutationType::Update,
            Self::MarkGotten { .. } => MutationType::MarkGotten,
            Self::Delete { .. } => MutationType::Delete,
        }
    }

    /// Check the identifying fields each intent needs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mutation_type = self.mutation_type();
        let require = |value: &str, field: &'static str| {
            if value.trim().is_empty() {
                Err(ValidationError::MissingField {
                    mutation_type,
                    field,
                })
            } else {
                Ok(())
            }
        };

        match self {
            Self::Add { list_id, item } => {
                require(list_id, "list_id")?;
                require(&item.name, "name")
            }
            Self::Update {
                item_id, changes, ..
            } => {
                require(item_id, "item_id")?;
                match changes.as_object() {
                    Some(fields) if !fields.is_empty() => Ok(()),
                    _ => Err(ValidationError::EmptyChanges),
                }
            }
            Self::MarkGotten { item_id, .. } | Self::Delete { item_id } => {
                require(item_id, "item_id")
            }
        }
    }

    /// The payload handed to the sync engine: the intent without its tag.
    pub fn into_payload(self) -> Result<serde_json::Value, ValidationError> {
        let mut value =
            serde_json::to_value(self).map_err(|e| ValidationError::Encode(e.to_string()))?;
        if let Some(fields) = value.as_object_mut() {
            fields.remove("type");
        }
        Ok(value)
    }
}
