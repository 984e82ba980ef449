use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    persist_response, ConfigField, ConfigKind, ConfigValidationError, ItemTypeBehavior,
    SaveContext, SELECT_MENU,
};
use crate::responses::{ResponseError, SaveOutcome};

const SCHEMA: &[ConfigField] = &[ConfigField {
    key: "options",
    kind: ConfigKind::Raw,
}];

/// One selectable choice. The id is what a response records; the value is
/// the display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub id: i64,
    pub value: String,
}

/// Single-choice selection among configured options.
pub struct SelectMenu;

impl ItemTypeBehavior for SelectMenu {
    fn tag(&self) -> &'static str {
        SELECT_MENU
    }

    fn config_schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    fn save_response(
        &self,
        ctx: &SaveContext<'_>,
        raw: Option<&str>,
    ) -> Result<SaveOutcome, ResponseError> {
        persist_response(self, ctx, raw)
    }

    /// `options` must be a list of `{id, value}` records; the list is stored
    /// re-serialized as a single config value.
    fn validate_config(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, String>, ConfigValidationError> {
        let mut validated = BTreeMap::new();
        for (key, value) in raw {
            if key != "options" {
                return Err(ConfigValidationError::UnknownKey(key.clone()));
            }
            let entries = value
                .as_array()
                .ok_or(ConfigValidationError::MalformedOptions)?;
            let mut options = Vec::with_capacity(entries.len());
            for entry in entries {
                let record = entry
                    .as_object()
                    .ok_or(ConfigValidationError::MalformedOptions)?;
                let id = record
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or(ConfigValidationError::MalformedOptions)?;
                let text = record
                    .get("value")
                    .and_then(Value::as_str)
                    .ok_or(ConfigValidationError::MalformedOptions)?;
                options.push(SelectOption {
                    id,
                    value: text.to_string(),
                });
            }
            let serialized = serde_json::to_string(&options)
                .map_err(|_| ConfigValidationError::MalformedOptions)?;
            validated.insert(key.clone(), serialized);
        }
        Ok(validated)
    }
}

/// Decode the configured options from a stored config map.
pub fn parse_options(config: &BTreeMap<String, String>) -> Vec<SelectOption> {
    config
        .get("options")
        .and_then(|stored| serde_json::from_str(stored).ok())
        .unwrap_or_default()
}
