use std::sync::Arc;

use chrono::Duration;
use portal_core::NextStep;
use portal_core::model::{AssessmentPhase, QuestionBank, QuestionNumber};
use portal_core::time::fixed_now;
use services::{Clock, InductionService, QuestionPage};
use storage::repository::{InMemoryRepository, Storage};

const EMAIL: &str = "new.analyst@example.com";

fn q(n: u16) -> QuestionNumber {
    QuestionNumber::new(n).unwrap()
}

fn bank() -> QuestionBank {
    QuestionBank::from_json(
        r#"[
            {"type": "SINGLE_CHOICE", "heading": "Can data leave the environment?",
             "options": ["Yes", "No"], "answers": ["No"]},
            {"type": "MULTIPLE_CHOICE", "heading": "Which outputs need review?",
             "options": ["Tables", "Charts", "Nothing"], "answers": ["Tables", "Charts"]},
            {"type": "SINGLE_CHOICE", "heading": "Who do you report incidents to?",
             "options": ["Nobody", "The data controller"], "answers": ["The data controller"]}
        ]"#,
    )
    .unwrap()
}

fn service(repo: &InMemoryRepository, clock: Clock) -> InductionService {
    InductionService::new(
        clock,
        Arc::new(bank()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

#[tokio::test]
async fn wrong_answers_are_remediated_until_passed() {
    let repo = InMemoryRepository::new();
    let svc = service(&repo, Clock::fixed(fixed_now()));

    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(1)));
    assert_eq!(
        svc.submit(EMAIL, q(1), &["Yes"]).await.unwrap(),
        NextStep::Question(q(2))
    );
    assert_eq!(
        svc.submit(EMAIL, q(2), &["Tables", "Charts"]).await.unwrap(),
        NextStep::Question(q(3))
    );
    let step = svc.submit(EMAIL, q(3), &["Nobody"]).await.unwrap();
    assert_eq!(
        step,
        NextStep::NotPassed {
            incorrect: vec![q(1), q(3)]
        }
    );

    let summary = svc.not_passed(EMAIL).await.unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].1, "Can data leave the environment?");

    // Remediation walks only the wrong questions.
    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(1)));
    assert_eq!(
        svc.question(EMAIL, q(3)).await.unwrap(),
        QuestionPage::Redirect(q(1))
    );
    assert_eq!(
        svc.submit(EMAIL, q(1), &["No"]).await.unwrap(),
        NextStep::Question(q(3))
    );
    match svc.question(EMAIL, q(3)).await.unwrap() {
        QuestionPage::Show(view) => {
            assert!(view.is_final);
            assert_eq!(view.back_link, Some(q(1)));
        }
        other => panic!("expected question page, got {other:?}"),
    }
    assert_eq!(
        svc.submit(EMAIL, q(3), &["The data controller"])
            .await
            .unwrap(),
        NextStep::Passed
    );

    assert!(svc.has_passed(EMAIL).await.unwrap());
    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Passed);
    assert_eq!(svc.question(EMAIL, q(2)).await.unwrap(), QuestionPage::Passed);

    let attempts = svc.attempts(EMAIL).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert!(!attempts[0].passed);
    assert_eq!(attempts[0].incorrect_questions, vec![q(1), q(3)]);
    assert!(attempts[1].passed);
    assert_eq!(attempts[1].attempted_questions, vec![q(1), q(3)]);
}

#[tokio::test]
async fn invalid_submissions_leave_state_untouched() {
    let repo = InMemoryRepository::new();
    let svc = service(&repo, Clock::fixed(fixed_now()));

    let empty: [&str; 0] = [];
    let err = svc.submit(EMAIL, q(1), &empty).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        Some("You must select an option to continue")
    );
    let err = svc.submit(EMAIL, q(2), &empty).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        Some("You must select at least one option to continue")
    );
    assert!(svc.submit(EMAIL, q(1), &["Maybe"]).await.is_err());

    assert_eq!(svc.state(EMAIL).await.unwrap().phase(), AssessmentPhase::NotStarted);
    assert!(svc.attempts(EMAIL).await.unwrap().is_empty());
}

#[tokio::test]
async fn state_expires_after_ttl() {
    let repo = InMemoryRepository::new();
    let start = fixed_now();
    let svc = service(&repo, Clock::fixed(start)).with_ttl(Duration::hours(1));
    svc.submit(EMAIL, q(1), &["No"]).await.unwrap();
    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(2)));

    let later = service(&repo, Clock::fixed(start + Duration::hours(2)));
    assert_eq!(later.start(EMAIL).await.unwrap(), NextStep::Question(q(1)));
}

#[tokio::test]
async fn state_is_per_user_and_resettable() {
    let repo = InMemoryRepository::new();
    let svc = service(&repo, Clock::fixed(fixed_now()));
    svc.submit(EMAIL, q(1), &["No"]).await.unwrap();

    assert_eq!(
        svc.start("someone.else@example.com").await.unwrap(),
        NextStep::Question(q(1))
    );

    svc.reset(EMAIL).await.unwrap();
    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(1)));
}

#[tokio::test]
async fn sqlite_backed_induction_survives_restart() {
    let url = "sqlite:file:memdb_induction_flow?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("storage");
    let build = |storage: &Storage| {
        InductionService::new(
            Clock::fixed(fixed_now()),
            Arc::new(bank()),
            Arc::clone(&storage.induction_states),
            Arc::clone(&storage.induction_attempts),
        )
    };

    let svc = build(&storage);
    svc.submit(EMAIL, q(1), &["No"]).await.unwrap();
    svc.submit(EMAIL, q(2), &["Charts", "Tables"]).await.unwrap();

    let reopened = Storage::sqlite(url).await.expect("reopen");
    let svc = build(&reopened);
    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(3)));
    assert_eq!(
        svc.submit(EMAIL, q(3), &["The data controller"])
            .await
            .unwrap(),
        NextStep::Passed
    );
    assert_eq!(svc.attempts(EMAIL).await.unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_range_option_keeps_saved_progress() {
    let repo = InMemoryRepository::new();
    let svc = service(&repo, Clock::fixed(fixed_now()));
    svc.submit(EMAIL, q(1), &["No"]).await.unwrap();
    svc.submit(EMAIL, q(2), &["Tables", "Charts"]).await.unwrap();

    let err = svc
        .submit_indices(EMAIL, q(3), [99].into_iter().collect())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), Some("Select one of the options shown"));

    let err = svc
        .submit_indices(EMAIL, q(3), [0, 1].into_iter().collect())
        .await
        .unwrap_err();
    assert_eq!(
        err.user_message(),
        Some("You must select an option to continue")
    );

    assert_eq!(svc.start(EMAIL).await.unwrap(), NextStep::Question(q(3)));
    assert_eq!(svc.state(EMAIL).await.unwrap().answers().len(), 2);
}
