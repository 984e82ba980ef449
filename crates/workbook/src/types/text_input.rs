use super::{
    persist_response, ConfigField, ConfigKind, ItemTypeBehavior, SaveContext, TEXT_INPUT,
};
use crate::responses::{ResponseError, SaveDecline, SaveOutcome};

const SCHEMA: &[ConfigField] = &[
    ConfigField {
        key: "placeholder",
        kind: ConfigKind::Text,
    },
    ConfigField {
        key: "maxlength",
        kind: ConfigKind::Integer,
    },
    ConfigField {
        key: "rows",
        kind: ConfigKind::Integer,
    },
];

/// Free-text entry. An empty or whitespace-only answer is never recorded:
/// the save declines and no response row is written.
pub struct TextInput;

impl ItemTypeBehavior for TextInput {
    fn tag(&self) -> &'static str {
        TEXT_INPUT
    }

    fn config_schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    fn save_response(
        &self,
        ctx: &SaveContext<'_>,
        raw: Option<&str>,
    ) -> Result<SaveOutcome, ResponseError> {
        let text = raw.map(str::trim).unwrap_or("");
        if text.is_empty() {
            return Ok(SaveOutcome::Declined(SaveDecline::EmptyResponse));
        }
        persist_response(self, ctx, Some(text))
    }
}
