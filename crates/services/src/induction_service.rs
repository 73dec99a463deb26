use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use portal_core::model::{AssessmentState, QuestionBank, QuestionNumber, UserHash};
use portal_core::{Induction, NextStep, QuestionView};
use storage::codec;
use storage::repository::{AttemptRecord, InductionAttemptRepository, InductionStateRepository};

use crate::Clock;
use crate::config::DEFAULT_INDUCTION_TTL_SECS;
use crate::error::InductionServiceError;

/// What to render for a requested question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionPage<'a> {
    /// The user skipped ahead; send them here instead.
    Redirect(QuestionNumber),
    Show(QuestionView<'a>),
    /// The assessment is already complete.
    Passed,
}

/// Runs the induction assessment for signed-in users, persisting state
/// between requests.
#[derive(Clone)]
pub struct InductionService {
    clock: Clock,
    bank: Arc<QuestionBank>,
    states: Arc<dyn InductionStateRepository>,
    attempts: Arc<dyn InductionAttemptRepository>,
    ttl: Duration,
}

impl InductionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<QuestionBank>,
        states: Arc<dyn InductionStateRepository>,
        attempts: Arc<dyn InductionAttemptRepository>,
    ) -> Self {
        Self {
            clock,
            bank,
            states,
            attempts,
            ttl: Duration::seconds(DEFAULT_INDUCTION_TTL_SECS),
        }
    }

    /// Override how long stored state lives after each save.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    fn engine(&self) -> Induction<'_> {
        Induction::new(&self.bank)
    }

    /// Current state for a user. Missing, expired or unusable state reads as
    /// a fresh assessment.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn state(&self, email: &str) -> Result<AssessmentState, InductionServiceError> {
        let user = UserHash::from_email(email);
        self.load(&user).await
    }

    async fn load(&self, user: &UserHash) -> Result<AssessmentState, InductionServiceError> {
        let stored = self.states.load_state(user, self.clock.now()).await?;
        Ok(stored.map_or_else(AssessmentState::new, |s| {
            codec::decode(&s.blob, user, &self.bank)
        }))
    }

    async fn save(
        &self,
        user: &UserHash,
        state: &AssessmentState,
    ) -> Result<(), InductionServiceError> {
        let blob = codec::encode(state, user)?;
        self.states
            .save_state(user, &blob, self.clock.expiry_after(self.ttl))
            .await?;
        Ok(())
    }

    /// Where the start page should send the user.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn start(&self, email: &str) -> Result<NextStep, InductionServiceError> {
        let state = self.state(email).await?;
        if state.is_passed() {
            return Ok(NextStep::Passed);
        }
        let engine = self.engine();
        let next = engine
            .next_unanswered_question(&state)
            .or_else(|| state.wrong_questions().first().copied())
            .unwrap_or(QuestionNumber::FIRST);
        Ok(NextStep::Question(next))
    }

    /// Page model for question `number`, or a redirect if it is not
    /// reachable yet.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Induction` for numbers past the bank
    /// and `Storage` if the repository fails.
    pub async fn question(
        &self,
        email: &str,
        number: QuestionNumber,
    ) -> Result<QuestionPage<'_>, InductionServiceError> {
        let state = self.state(email).await?;
        if state.is_passed() {
            return Ok(QuestionPage::Passed);
        }
        let engine = self.engine();
        if let Some(target) = engine.redirect_target(&state, number) {
            tracing::debug!(requested = %number, %target, "redirecting to unanswered question");
            return Ok(QuestionPage::Redirect(target));
        }
        Ok(QuestionPage::Show(engine.question_view(&state, number)?))
    }

    /// Record option values submitted for question `number` and move on.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Induction` when the selection is
    /// empty or names an unknown option; nothing is saved in that case.
    pub async fn submit<S: AsRef<str>>(
        &self,
        email: &str,
        number: QuestionNumber,
        selected: &[S],
    ) -> Result<NextStep, InductionServiceError> {
        let indices = self.engine().resolve_selection(number, selected)?;
        self.submit_indices(email, number, indices).await
    }

    /// Like [`Self::submit`] with option indices instead of option values.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub async fn submit_indices(
        &self,
        email: &str,
        number: QuestionNumber,
        selected: BTreeSet<usize>,
    ) -> Result<NextStep, InductionServiceError> {
        let user = UserHash::from_email(email);
        let state = self.load(&user).await?;
        let advance = self.engine().submit(&state, number, selected)?;
        self.save(&user, &advance.state).await?;

        if let Some(report) = advance.attempt.as_ref() {
            tracing::info!(
                user = ?user,
                passed = report.passed,
                incorrect = report.incorrect_questions.len(),
                "induction attempt scored"
            );
            let record = AttemptRecord::from_report(user.clone(), report, self.clock.now());
            if let Err(err) = self.attempts.append_attempt(&record).await {
                tracing::error!(user = ?user, error = %err, "failed to record induction attempt");
            }
        }
        Ok(advance.step)
    }

    /// Headings of the questions still to be corrected.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn not_passed(
        &self,
        email: &str,
    ) -> Result<Vec<(QuestionNumber, String)>, InductionServiceError> {
        let state = self.state(email).await?;
        Ok(self
            .engine()
            .not_passed_summary(&state)
            .into_iter()
            .map(|(number, heading)| (number, heading.to_string()))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn has_passed(&self, email: &str) -> Result<bool, InductionServiceError> {
        Ok(self.state(email).await?.is_passed())
    }

    /// Scored attempts for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn attempts(&self, email: &str) -> Result<Vec<AttemptRecord>, InductionServiceError> {
        let user = UserHash::from_email(email);
        Ok(self.attempts.attempts_for_user(&user).await?)
    }

    /// Forget a user's progress.
    ///
    /// # Errors
    ///
    /// Returns `InductionServiceError::Storage` if the repository fails.
    pub async fn reset(&self, email: &str) -> Result<(), InductionServiceError> {
        let user = UserHash::from_email(email);
        self.states.clear_state(&user).await?;
        tracing::info!(user = ?user, "induction state cleared");
        Ok(())
    }
}
