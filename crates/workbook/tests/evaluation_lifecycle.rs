//! Integration coverage for the evaluation version lifecycle: lazy opening,
//! write-once finalisation, and atomic supersession.

mod common {
    use std::sync::Arc;

    use workbook::checklist::{DefinitionId, Item, SectionId};
    use workbook::evaluation::SubjectId;
    use workbook::router::WorkbookServices;
    use workbook::store::{InMemoryFileStorage, InMemoryStore, RecordingCompletionGate};
    use workbook::types::{ItemTypeRegistry, TEXT_INPUT};

    pub(super) const DEFINITION: DefinitionId = DefinitionId(3);
    pub(super) const SUBJECT: SubjectId = SubjectId(88);

    pub(super) type Services =
        WorkbookServices<InMemoryStore, InMemoryFileStorage, RecordingCompletionGate>;

    pub(super) fn services() -> Services {
        let store = Arc::new(InMemoryStore::new());
        let files = Arc::new(InMemoryFileStorage::default());
        let gate = Arc::new(RecordingCompletionGate::default());
        let registry = Arc::new(ItemTypeRegistry::with_builtins());
        WorkbookServices::new(store, files, gate, registry)
    }

    /// One section with two required text items.
    pub(super) fn seeded_checklist(services: &Services) -> (SectionId, Vec<Item>) {
        let section = services
            .content
            .add_section(DEFINITION, "Competencies", None)
            .expect("can add section");
        let items = ["Hand hygiene", "Handover quality"]
            .iter()
            .map(|name| {
                services
                    .content
                    .add_item(section.id, name, None, true, TEXT_INPUT)
                    .expect("can add item")
            })
            .collect();
        (section.id, items)
    }
}

mod lifecycle {
    use super::common::*;
    use chrono::Utc;
    use workbook::evaluation::{ActorId, FinaliseOutcome, VersionDecline, VersionOutcome};

    #[test]
    fn the_first_interaction_opens_version_one() {
        let services = services();
        let first = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens lazily");
        assert_eq!(first.version, 1);
        assert!(first.active);
        assert!(!first.finalised);

        let second = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("reuses the active row");
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn finalisation_is_write_once() {
        let services = services();
        let evaluation = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        let first_sign_off = Utc::now();
        let outcome = services
            .evaluations
            .finalise(evaluation.id, ActorId(9), first_sign_off)
            .expect("finalises");
        let finalised = match outcome {
            FinaliseOutcome::Finalised(finalised) => finalised,
            FinaliseOutcome::AlreadyFinalised => panic!("first finalise must write"),
        };
        assert_eq!(finalised.finalised_by, Some(ActorId(9)));
        assert_eq!(finalised.finalised_at, Some(first_sign_off));

        // A repeat attempt with a different actor changes nothing.
        let repeat = services
            .evaluations
            .finalise(evaluation.id, ActorId(10), Utc::now())
            .expect("repeat call is not an error");
        assert!(matches!(repeat, FinaliseOutcome::AlreadyFinalised));

        let stored = services
            .evaluations
            .evaluation(evaluation.id)
            .expect("still present");
        assert_eq!(stored.finalised_by, Some(ActorId(9)));
        assert_eq!(stored.finalised_at, Some(first_sign_off));
    }

    #[test]
    fn drafts_cannot_be_reversioned() {
        let services = services();
        let evaluation = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        let outcome = services
            .evaluations
            .create_new_version(evaluation.id)
            .expect("decline is not an error");
        assert!(matches!(
            outcome,
            VersionOutcome::Declined(VersionDecline::NotFinalised)
        ));
    }

    #[test]
    fn superseding_keeps_exactly_one_active_version() {
        let services = services();
        let v1 = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");
        services
            .evaluations
            .finalise(v1.id, ActorId(9), Utc::now())
            .expect("finalises");

        let v2 = match services
            .evaluations
            .create_new_version(v1.id)
            .expect("supersedes")
        {
            VersionOutcome::Created(v2) => v2,
            other => panic!("expected a new version, got {other:?}"),
        };
        assert_eq!(v2.version, 2);
        assert!(v2.active);
        assert!(!v2.finalised);

        let retired = services.evaluations.evaluation(v1.id).expect("kept");
        assert!(!retired.active);
        assert!(retired.finalised);

        let active = services
            .evaluations
            .active(DEFINITION, SUBJECT)
            .expect("readable")
            .expect("one active row");
        assert_eq!(active.id, v2.id);

        // The retired row can never re-version.
        let outcome = services
            .evaluations
            .create_new_version(v1.id)
            .expect("decline is not an error");
        assert!(matches!(
            outcome,
            VersionOutcome::Declined(VersionDecline::Superseded)
        ));
    }

    #[test]
    fn versions_climb_monotonically() {
        let services = services();
        let mut current = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        for expected in 2..=4 {
            services
                .evaluations
                .finalise(current.id, ActorId(9), Utc::now())
                .expect("finalises");
            current = match services
                .evaluations
                .create_new_version(current.id)
                .expect("supersedes")
            {
                VersionOutcome::Created(next) => next,
                other => panic!("expected version {expected}, got {other:?}"),
            };
            assert_eq!(current.version, expected);
        }
    }

    #[test]
    fn a_new_version_starts_with_a_clean_slate() {
        let services = services();
        let (_, items) = seeded_checklist(&services);
        let v1 = services
            .evaluations
            .get_or_create_active(DEFINITION, SUBJECT)
            .expect("opens");

        for item in &items {
            let outcome = services
                .responses
                .save(item.id, &v1, Some("observed"))
                .expect("saves");
            assert!(outcome.is_saved());
        }
        let before = services
            .evaluations
            .completion(DEFINITION, SUBJECT, v1.version)
            .expect("aggregates");
        assert_eq!((before.completed, before.required), (2, 2));

        services
            .evaluations
            .finalise(v1.id, ActorId(9), Utc::now())
            .expect("finalises");
        let v2 = match services
            .evaluations
            .create_new_version(v1.id)
            .expect("supersedes")
        {
            VersionOutcome::Created(v2) => v2,
            other => panic!("expected a new version, got {other:?}"),
        };

        // Version 1 answers are preserved but never bleed into version 2.
        let kept = services
            .responses
            .get(items[0].id, SUBJECT, v1.version)
            .expect("readable");
        assert!(kept.is_some());
        let fresh = services
            .responses
            .get(items[0].id, SUBJECT, v2.version)
            .expect("readable");
        assert!(fresh.is_none());

        let after = services
            .evaluations
            .completion(DEFINITION, SUBJECT, v2.version)
            .expect("aggregates");
        assert_eq!((after.completed, after.required), (0, 2));
    }
}
