use chrono::NaiveDate;

use super::{persist_response, ConfigField, ItemTypeBehavior, SaveContext, DATE_PICKER};
use crate::responses::{Response, ResponseError, SaveOutcome};

/// Calendar date selection. No config keys; the default save and completion
/// rules apply unchanged.
pub struct DatePicker;

impl ItemTypeBehavior for DatePicker {
    fn tag(&self) -> &'static str {
        DATE_PICKER
    }

    fn config_schema(&self) -> &'static [ConfigField] {
        &[]
    }

    fn save_response(
        &self,
        ctx: &SaveContext<'_>,
        raw: Option<&str>,
    ) -> Result<SaveOutcome, ResponseError> {
        persist_response(self, ctx, raw)
    }
}

/// The calendar date a stored response represents, when it parses.
pub fn selected_date(response: &Response) -> Option<NaiveDate> {
    response
        .value
        .as_deref()
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
}
