use super::{
    persist_response, ConfigField, ConfigKind, ItemTypeBehavior, SaveContext, FILE_UPLOAD,
};
use crate::checklist::ItemId;
use crate::evaluation::SubjectId;
use crate::responses::{ResponseError, ResponseRepository, SaveOutcome};
use crate::store::RepositoryError;

const SCHEMA: &[ConfigField] = &[ConfigField {
    key: "filetypes",
    kind: ConfigKind::Text,
}];

/// File attachment. Bytes live in the external file area; the raw value is
/// ignored and the save only records that an upload round-trip happened.
pub struct FileUpload;

impl ItemTypeBehavior for FileUpload {
    fn tag(&self) -> &'static str {
        FILE_UPLOAD
    }

    fn config_schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    fn save_response(
        &self,
        ctx: &SaveContext<'_>,
        _raw: Option<&str>,
    ) -> Result<SaveOutcome, ResponseError> {
        let config = ctx.configs.fetch_config(ctx.item.id)?;
        let filetypes = config.get("filetypes").map(String::as_str);
        ctx.files
            .record_upload(ctx.item.id, ctx.subject, ctx.version, filetypes)?;
        persist_response(self, ctx, Some(""))
    }

    /// Presence of the item counts as satisfied; the file area is never
    /// consulted, so an upload is not independently verified here.
    fn is_completed(
        &self,
        _responses: &dyn ResponseRepository,
        _item: ItemId,
        _subject: SubjectId,
        _version: u32,
    ) -> Result<bool, RepositoryError> {
        Ok(true)
    }
}
