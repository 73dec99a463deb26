use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::ids::QuestionNumber;

/// Selected option indices for each answered question.
pub type Answers = BTreeMap<QuestionNumber, BTreeSet<usize>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentStateError {
    #[error("a passed assessment cannot have questions to retake")]
    PassedWithWrongQuestions,

    #[error("question {0} is listed for retake more than once")]
    DuplicateWrongQuestion(QuestionNumber),

    #[error("question {0} has an empty selection")]
    EmptySelection(QuestionNumber),
}

/// Where a user is in the induction assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentPhase {
    /// No answers recorded and nothing to retake.
    NotStarted,
    /// Working through the full question list.
    InProgress,
    /// Retaking only the questions answered wrongly last time.
    Remediating,
    /// All questions answered correctly.
    Passed,
}

/// Per-user progress through the induction assessment.
///
/// `wrong` is non-empty only while remediating, and never at the same time
/// as `passed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssessmentState {
    answers: Answers,
    wrong: Vec<QuestionNumber>,
    passed: bool,
}

impl AssessmentState {
    /// A fresh, not-started state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from persisted parts, checking the invariants.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentStateError` if `passed` is set alongside retake
    /// questions, a retake question repeats, or a selection is empty.
    pub fn from_parts(
        answers: Answers,
        wrong: Vec<QuestionNumber>,
        passed: bool,
    ) -> Result<Self, AssessmentStateError> {
        if passed && !wrong.is_empty() {
            return Err(AssessmentStateError::PassedWithWrongQuestions);
        }
        let mut seen = BTreeSet::new();
        for number in &wrong {
            if !seen.insert(*number) {
                return Err(AssessmentStateError::DuplicateWrongQuestion(*number));
            }
        }
        if let Some((number, _)) = answers.iter().find(|(_, selected)| selected.is_empty()) {
            return Err(AssessmentStateError::EmptySelection(*number));
        }
        Ok(Self {
            answers,
            wrong,
            passed,
        })
    }

    /// State after a clean pass: nothing answered, nothing to retake.
    #[must_use]
    pub fn passed() -> Self {
        Self {
            answers: Answers::new(),
            wrong: Vec::new(),
            passed: true,
        }
    }

    /// State entering remediation for the given questions.
    #[must_use]
    pub fn remediating(wrong: Vec<QuestionNumber>) -> Self {
        Self {
            answers: Answers::new(),
            wrong,
            passed: false,
        }
    }

    #[must_use]
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, number: QuestionNumber) -> Option<&BTreeSet<usize>> {
        self.answers.get(&number)
    }

    #[must_use]
    pub fn is_answered(&self, number: QuestionNumber) -> bool {
        self.answers.contains_key(&number)
    }

    /// Questions being retaken, in retake order.
    #[must_use]
    pub fn wrong_questions(&self) -> &[QuestionNumber] {
        &self.wrong
    }

    #[must_use]
    pub fn is_remediating(&self) -> bool {
        !self.wrong.is_empty()
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn phase(&self) -> AssessmentPhase {
        if self.passed {
            AssessmentPhase::Passed
        } else if !self.wrong.is_empty() {
            AssessmentPhase::Remediating
        } else if self.answers.is_empty() {
            AssessmentPhase::NotStarted
        } else {
            AssessmentPhase::InProgress
        }
    }

    /// Copy of this state with one answer replaced.
    pub(crate) fn with_answer(&self, number: QuestionNumber, selected: BTreeSet<usize>) -> Self {
        let mut next = self.clone();
        next.answers.insert(number, selected);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: u16) -> QuestionNumber {
        QuestionNumber::new(n).unwrap()
    }

    #[test]
    fn phases_follow_state() {
        assert_eq!(AssessmentState::new().phase(), AssessmentPhase::NotStarted);
        assert_eq!(AssessmentState::passed().phase(), AssessmentPhase::Passed);
        assert_eq!(
            AssessmentState::remediating(vec![q(2)]).phase(),
            AssessmentPhase::Remediating
        );
        let started = AssessmentState::new().with_answer(q(1), [0].into_iter().collect());
        assert_eq!(started.phase(), AssessmentPhase::InProgress);
    }

    #[test]
    fn passed_and_wrong_are_exclusive() {
        let err = AssessmentState::from_parts(Answers::new(), vec![q(1)], true).unwrap_err();
        assert_eq!(err, AssessmentStateError::PassedWithWrongQuestions);
    }

    #[test]
    fn rejects_duplicate_wrong_questions() {
        let err = AssessmentState::from_parts(Answers::new(), vec![q(3), q(3)], false).unwrap_err();
        assert_eq!(err, AssessmentStateError::DuplicateWrongQuestion(q(3)));
    }

    #[test]
    fn rejects_empty_selection() {
        let mut answers = Answers::new();
        answers.insert(q(4), BTreeSet::new());
        let err = AssessmentState::from_parts(answers, Vec::new(), false).unwrap_err();
        assert_eq!(err, AssessmentStateError::EmptySelection(q(4)));
    }

    #[test]
    fn with_answer_leaves_original_untouched() {
        let original = AssessmentState::new();
        let updated = original.with_answer(q(1), [1].into_iter().collect());
        assert!(original.answers().is_empty());
        assert!(updated.is_answered(q(1)));
    }
}
