use chrono::Utc;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use workbook::checklist::DefinitionId;
use workbook::error::AppError;
use workbook::evaluation::{ActorId, FinaliseOutcome, SubjectId, VersionOutcome};
use workbook::responses::SaveOutcome;
use workbook::router::WorkbookServices;
use workbook::store::{InMemoryFileStorage, InMemoryStore, RecordingCompletionGate};
use workbook::types::{self, ItemTypeRegistry};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Subject the demo evaluation is recorded against
    #[arg(long, default_value_t = 501)]
    pub(crate) subject: u64,
    /// Actor signing off the finalisation step
    #[arg(long, default_value_t = 42)]
    pub(crate) assessor: u64,
    /// Stop after finalising instead of opening version 2
    #[arg(long)]
    pub(crate) skip_new_version: bool,
}

#[derive(Debug, Serialize)]
struct ProgressView {
    version: u32,
    completed: u32,
    required: u32,
    complete: bool,
}

/// Build a small clinical-skills checklist, answer it for one subject, and
/// walk the evaluation through finalisation and re-versioning.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryStore::new());
    let files = Arc::new(InMemoryFileStorage::default());
    let gate = Arc::new(RecordingCompletionGate::default());
    let registry = Arc::new(ItemTypeRegistry::with_builtins());
    let services = WorkbookServices::new(store, files.clone(), gate.clone(), registry);

    let definition = DefinitionId(1);
    let subject = SubjectId(args.subject);

    let section = services
        .content
        .add_section(definition, "Clinical skills", None)?;
    let notes = services.content.add_item(
        section.id,
        "Describe the handover process",
        Some("Free-text summary in the subject's own words"),
        true,
        types::TEXT_INPUT,
    )?;
    let grade = services.content.add_item(
        section.id,
        "Overall impression",
        None,
        true,
        types::SELECT_MENU,
    )?;
    let observed_on =
        services
            .content
            .add_item(section.id, "Date observed", None, true, types::DATE_PICKER)?;
    let certificate = services.content.add_item(
        section.id,
        "Upload signed competency sheet",
        None,
        true,
        types::FILE_UPLOAD,
    )?;

    let options = json!({
        "options": [
            { "id": 1, "value": "Below expectations" },
            { "id": 2, "value": "Meets expectations" },
            { "id": 3, "value": "Exceeds expectations" },
        ]
    });
    if let Some(raw) = options.as_object() {
        services.content.update_item_config(grade.id, raw)?;
    }

    let evaluation = services
        .evaluations
        .get_or_create_active(definition, subject)?;
    println!(
        "opened evaluation {} at version {}",
        evaluation.id, evaluation.version
    );

    for (item, value) in [
        (&notes, "Clear, structured handover with full vitals recap"),
        (&grade, "2"),
        (&observed_on, "2026-08-27"),
        (&certificate, ""),
    ] {
        let outcome = services.responses.save(item.id, &evaluation, Some(value))?;
        match outcome {
            SaveOutcome::Saved(response) => {
                println!("  answered '{}' (completed: {})", item.name, response.completed)
            }
            SaveOutcome::Declined(reason) => {
                println!("  '{}' declined: {reason:?}", item.name)
            }
        }
    }

    let progress = services
        .evaluations
        .completion(definition, subject, evaluation.version)?;
    let view = ProgressView {
        version: evaluation.version,
        completed: progress.completed,
        required: progress.required,
        complete: progress.is_complete(),
    };
    println!(
        "progress: {}",
        serde_json::to_string_pretty(&view).unwrap_or_default()
    );
    for upload in files.uploads() {
        println!("  upload recorded for item {} (version {})", upload.item, upload.version);
    }
    for notice in gate.notices() {
        println!(
            "  completion notice: subject {} reached {}/{} at version {}",
            notice.subject, notice.progress.completed, notice.progress.required, notice.version
        );
    }

    match services
        .evaluations
        .finalise(evaluation.id, ActorId(args.assessor), Utc::now())?
    {
        FinaliseOutcome::Finalised(finalised) => println!(
            "finalised version {} by actor {:?} at {:?}",
            finalised.version, finalised.finalised_by, finalised.finalised_at
        ),
        FinaliseOutcome::AlreadyFinalised => println!("already finalised"),
    }

    // A finalised evaluation refuses further answers.
    let refused = services
        .responses
        .save(notes.id, &services.evaluations.evaluation(evaluation.id)?, Some("late edit"))?;
    println!("post-finalisation save attempt: {refused:?}");

    if args.skip_new_version {
        return Ok(());
    }

    match services.evaluations.create_new_version(evaluation.id)? {
        VersionOutcome::Created(next) => {
            let fresh = services
                .evaluations
                .completion(definition, subject, next.version)?;
            println!(
                "opened version {} (progress resets to {}/{})",
                next.version, fresh.completed, fresh.required
            );
        }
        VersionOutcome::Declined(reason) => println!("new version declined: {reason:?}"),
    }

    Ok(())
}
