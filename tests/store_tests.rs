// tests/store_tests.rs

use sqlx::postgres::PgPoolOptions;
use survey_backend::{
    models::{
        answer::{AnswerPayload, NewAnswer},
        participation::{Completion, NewParticipation},
        survey::{AccessType, NewSurvey},
    },
    store::{PgStore, StoreError, SurveyStore},
};
use uuid::Uuid;

/// Connects to the database named by DATABASE_URL and applies the migrations.
/// Returns None (and the test is skipped) when no database is configured.
async fn setup_store() -> Option<PgStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is valid.");

    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to run migrations");
    Some(store)
}

async fn insert_survey(store: &PgStore) -> i64 {
    store
        .insert_survey(NewSurvey {
            slug_base: "store-test".to_string(),
            title: "Store test".to_string(),
            description: "Exercised by store_tests".to_string(),
            intro_text: None,
            consent_text: None,
            outro_text: None,
            access_type: AccessType::Public,
            attachment: None,
            questions: Vec::new(),
            created_by: None,
        })
        .await
        .expect("Failed to insert survey")
        .id
}

fn participant(survey_id: i64, key: &str) -> NewParticipation {
    NewParticipation {
        survey_id,
        participant_key: key.to_string(),
        participant_name: Some("Store Tester".to_string()),
        invitation_id: None,
    }
}

fn text(question_id: i64, value: &str) -> NewAnswer {
    NewAnswer {
        question_id,
        payload: AnswerPayload::Text {
            text_value: value.to_string(),
        },
    }
}

#[tokio::test]
async fn start_participation_is_insert_or_get() {
    let Some(store) = setup_store().await else {
        return;
    };
    let survey_id = insert_survey(&store).await;
    let key = format!("user:{}", Uuid::new_v4());

    let first = store.start_participation(participant(survey_id, &key)).await.unwrap();
    assert!(first.created);

    let again = store.start_participation(participant(survey_id, &key)).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.participation.id, first.participation.id);

    let other = store
        .start_participation(participant(survey_id, &format!("anon:{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert!(other.created);
    assert_ne!(other.participation.id, first.participation.id);

    assert_eq!(store.list_participations(survey_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn upsert_overwrites_and_refuses_completed_participations() {
    let Some(store) = setup_store().await else {
        return;
    };
    let survey_id = insert_survey(&store).await;
    let started = store
        .start_participation(participant(survey_id, &format!("user:{}", Uuid::new_v4())))
        .await
        .unwrap();
    let id = started.participation.id;

    store.upsert_answers(id, vec![text(1, "first"), text(2, "other")]).await.unwrap();
    store.upsert_answers(id, vec![text(1, "second")]).await.unwrap();

    let answers = store.answers_for_participation(id).await.unwrap();
    assert_eq!(answers.len(), 2);
    let first = answers.iter().find(|a| a.question_id == 1).unwrap();
    assert_eq!(first.payload.text(), Some("second"));

    store.complete_participation(id, chrono::Utc::now()).await.unwrap();
    let err = store.upsert_answers(id, vec![text(1, "late")]).await.unwrap_err();
    assert!(matches!(err, StoreError::ParticipationClosed { .. }));

    let err = store.upsert_answers(Uuid::new_v4(), vec![text(1, "ghost")]).await.unwrap_err();
    assert!(matches!(err, StoreError::ParticipationMissing(_)));

    let answers = store.answers_for_participation(id).await.unwrap();
    let first = answers.iter().find(|a| a.question_id == 1).unwrap();
    assert_eq!(first.payload.text(), Some("second"));
}

#[tokio::test]
async fn completion_happens_once() {
    let Some(store) = setup_store().await else {
        return;
    };
    let survey_id = insert_survey(&store).await;
    let started = store
        .start_participation(participant(survey_id, &format!("user:{}", Uuid::new_v4())))
        .await
        .unwrap();
    let id = started.participation.id;

    let stamped = match store.complete_participation(id, chrono::Utc::now()).await.unwrap() {
        Completion::Completed(participation) => participation.completed_at,
        other => panic!("expected first completion, got {:?}", other),
    };
    assert!(stamped.is_some());

    match store.complete_participation(id, chrono::Utc::now()).await.unwrap() {
        Completion::AlreadyCompleted(participation) => assert_eq!(participation.completed_at, stamped),
        other => panic!("expected AlreadyCompleted, got {:?}", other),
    }

    assert!(matches!(
        store.complete_participation(Uuid::new_v4(), chrono::Utc::now()).await.unwrap(),
        Completion::NotFound
    ));

    assert_eq!(store.answers_for_survey(survey_id, true).await.unwrap().len(), 0);
    let completed = store
        .start_participation(participant(survey_id, &started.participation.participant_key))
        .await
        .unwrap();
    assert!(!completed.created);
    assert!(completed.participation.is_completed());
}
