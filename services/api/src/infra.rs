use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use workbook::checklist::{DefinitionId, ItemId};
use workbook::evaluation::{CompletionGate, CompletionProgress, SubjectId};
use workbook::types::{FileStorage, FileStorageError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Completion sink for the service process: completions become log events
/// until a downstream notifier is wired in.
#[derive(Default)]
pub(crate) struct LogCompletionGate;

impl CompletionGate for LogCompletionGate {
    fn notify_complete(
        &self,
        definition: DefinitionId,
        subject: SubjectId,
        version: u32,
        progress: &CompletionProgress,
    ) {
        info!(
            %definition,
            %subject,
            version,
            completed = progress.completed,
            required = progress.required,
            "required checklist set fully complete"
        );
    }
}

/// File area stand-in: acknowledges the upload round-trip and logs it. Bytes
/// never pass through this process.
#[derive(Default)]
pub(crate) struct LogFileStorage;

impl FileStorage for LogFileStorage {
    fn record_upload(
        &self,
        item: ItemId,
        subject: SubjectId,
        version: u32,
        filetypes: Option<&str>,
    ) -> Result<(), FileStorageError> {
        info!(%item, %subject, version, ?filetypes, "upload recorded");
        Ok(())
    }
}
