//! Integration coverage for the response pipeline: type-specific save rules,
//! the finalisation gate, and the completion aggregate.

mod common {
    use std::sync::Arc;

    use serde_json::json;
    use workbook::checklist::{DefinitionId, Item};
    use workbook::evaluation::SubjectId;
    use workbook::router::WorkbookServices;
    use workbook::store::{InMemoryFileStorage, InMemoryStore, RecordingCompletionGate};
    use workbook::types::{ItemTypeRegistry, DATE_PICKER, FILE_UPLOAD, SELECT_MENU, TEXT_INPUT};

    pub(super) const DEFINITION: DefinitionId = DefinitionId(5);
    pub(super) const SUBJECT: SubjectId = SubjectId(301);

    pub(super) struct Harness {
        pub(super) services:
            WorkbookServices<InMemoryStore, InMemoryFileStorage, RecordingCompletionGate>,
        pub(super) files: Arc<InMemoryFileStorage>,
        pub(super) gate: Arc<RecordingCompletionGate>,
    }

    pub(super) fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let files = Arc::new(InMemoryFileStorage::default());
        let gate = Arc::new(RecordingCompletionGate::default());
        let registry = Arc::new(ItemTypeRegistry::with_builtins());
        let services = WorkbookServices::new(store, files.clone(), gate.clone(), registry);
        Harness {
            services,
            files,
            gate,
        }
    }

    pub(super) struct SeededItems {
        pub(super) notes: Item,
        pub(super) grade: Item,
        pub(super) observed_on: Item,
        pub(super) certificate: Item,
        pub(super) optional_remarks: Item,
    }

    /// One section covering all four built-in types plus an optional item.
    pub(super) fn seeded_items(harness: &Harness) -> SeededItems {
        let content = &harness.services.content;
        let section = content
            .add_section(DEFINITION, "Placement review", None)
            .expect("can add section");

        let notes = content
            .add_item(section.id, "Narrative", None, true, TEXT_INPUT)
            .expect("can add");
        let grade = content
            .add_item(section.id, "Grade", None, true, SELECT_MENU)
            .expect("can add");
        let observed_on = content
            .add_item(section.id, "Observed on", None, true, DATE_PICKER)
            .expect("can add");
        let certificate = content
            .add_item(section.id, "Signed sheet", None, true, FILE_UPLOAD)
            .expect("can add");
        let optional_remarks = content
            .add_item(section.id, "Extra remarks", None, false, TEXT_INPUT)
            .expect("can add");

        let options = json!({ "options": [
            { "id": 1, "value": "Pass" },
            { "id": 2, "value": "Fail" },
        ]});
        content
            .update_item_config(grade.id, options.as_object().expect("object"))
            .expect("valid config");
        let filetypes = json!({ "filetypes": ".pdf" });
        content
            .update_item_config(certificate.id, filetypes.as_object().expect("object"))
            .expect("valid config");

        SeededItems {
            notes,
            grade,
            observed_on,
            certificate,
            optional_remarks,
        }
    }
}

mod saving {
    use super::common::*;
    use workbook::responses::{SaveDecline, SaveOutcome};
    use workbook::types::selected_date;

    #[test]
    fn whitespace_answers_to_text_items_are_declined() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        let outcome = harness
            .services
            .responses
            .save(items.notes.id, &evaluation, Some("   "))
            .expect("decline is not an error");
        assert_eq!(outcome, SaveOutcome::Declined(SaveDecline::EmptyResponse));

        let stored = harness
            .services
            .responses
            .get(items.notes.id, SUBJECT, evaluation.version)
            .expect("readable");
        assert!(stored.is_none(), "a declined save must leave no row behind");
    }

    #[test]
    fn text_answers_are_trimmed_before_storage() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        let outcome = harness
            .services
            .responses
            .save(items.notes.id, &evaluation, Some("  solid work  "))
            .expect("saves");
        match outcome {
            SaveOutcome::Saved(response) => {
                assert_eq!(response.value.as_deref(), Some("solid work"));
                assert!(response.completed);
            }
            other => panic!("expected a saved response, got {other:?}"),
        }
    }

    #[test]
    fn date_answers_read_back_as_calendar_dates() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        harness
            .services
            .responses
            .save(items.observed_on.id, &evaluation, Some("2026-03-14"))
            .expect("saves");
        let stored = harness
            .services
            .responses
            .get(items.observed_on.id, SUBJECT, evaluation.version)
            .expect("readable")
            .expect("present");
        let date = selected_date(&stored).expect("parses");
        assert_eq!(date.to_string(), "2026-03-14");
    }

    #[test]
    fn file_uploads_complete_immediately_and_reach_the_file_area() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        let outcome = harness
            .services
            .responses
            .save(items.certificate.id, &evaluation, None)
            .expect("saves");
        match outcome {
            SaveOutcome::Saved(response) => assert!(response.completed),
            other => panic!("expected a saved response, got {other:?}"),
        }

        let uploads = harness.files.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].item, items.certificate.id);
        assert_eq!(uploads[0].filetypes.as_deref(), Some(".pdf"));
    }
}

mod aggregation {
    use super::common::*;
    use chrono::Utc;
    use workbook::evaluation::ActorId;
    use workbook::responses::{SaveDecline, SaveOutcome};

    #[test]
    fn optional_items_never_count_towards_progress() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        harness
            .services
            .responses
            .save(items.notes.id, &evaluation, Some("good"))
            .expect("saves");
        let after_required = harness
            .services
            .evaluations
            .completion(DEFINITION, SUBJECT, evaluation.version)
            .expect("aggregates");
        assert_eq!((after_required.completed, after_required.required), (1, 4));

        harness
            .services
            .responses
            .save(items.optional_remarks.id, &evaluation, Some("bonus"))
            .expect("saves");
        let after_optional = harness
            .services
            .evaluations
            .completion(DEFINITION, SUBJECT, evaluation.version)
            .expect("aggregates");
        assert_eq!(
            (after_optional.completed, after_optional.required),
            (1, 4),
            "optional answers must not move the aggregate"
        );
    }

    #[test]
    fn the_gate_fires_exactly_when_the_required_set_fills() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        harness
            .services
            .responses
            .save(items.notes.id, &evaluation, Some("good"))
            .expect("saves");
        harness
            .services
            .responses
            .save(items.grade.id, &evaluation, Some("1"))
            .expect("saves");
        harness
            .services
            .responses
            .save(items.observed_on.id, &evaluation, Some("2026-03-14"))
            .expect("saves");
        assert!(harness.gate.notices().is_empty());

        harness
            .services
            .responses
            .save(items.certificate.id, &evaluation, None)
            .expect("saves");

        let notices = harness.gate.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].subject, SUBJECT);
        assert_eq!(notices[0].version, evaluation.version);
        assert_eq!(
            (notices[0].progress.completed, notices[0].progress.required),
            (4, 4)
        );
    }

    #[test]
    fn finalised_evaluations_refuse_new_answers() {
        let harness = harness();
        let items = seeded_items(&harness);
        let evaluation = harness
            .services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        assert!(harness.services.evaluations.can_record_response(&evaluation));
        harness
            .services
            .responses
            .save(items.notes.id, &evaluation, Some("first answer"))
            .expect("saves");
        harness
            .services
            .evaluations
            .finalise(evaluation.id, ActorId(7), Utc::now())
            .expect("finalises");

        let closed = harness
            .services
            .evaluations
            .evaluation(evaluation.id)
            .expect("present");
        assert!(
            !harness.services.evaluations.can_record_response(&closed),
            "a finalised row must refuse response writes"
        );
        let outcome = harness
            .services
            .responses
            .save(items.notes.id, &closed, Some("late edit"))
            .expect("decline is not an error");
        assert_eq!(outcome, SaveOutcome::Declined(SaveDecline::EvaluationClosed));

        let stored = harness
            .services
            .responses
            .get(items.notes.id, SUBJECT, evaluation.version)
            .expect("readable")
            .expect("present");
        assert_eq!(stored.value.as_deref(), Some("first answer"));
    }
}
