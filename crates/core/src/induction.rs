//! Induction assessment sequencing and scoring.
//!
//! All functions are pure: they take the current [`AssessmentState`] and
//! return a new one, leaving persistence to the caller.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::model::{
    Answers, AssessmentState, Question, QuestionBank, QuestionKind, QuestionNumber,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InductionError {
    #[error("invalid selection for question {number}")]
    InvalidSelection {
        number: QuestionNumber,
        kind: QuestionKind,
    },

    #[error("question {number} has no option {option:?}")]
    UnknownOption {
        number: QuestionNumber,
        option: String,
    },

    #[error("question {number} has no option at index {index}")]
    OptionOutOfRange { number: QuestionNumber, index: usize },

    #[error("question {0} is not in the question bank")]
    QuestionOutOfRange(QuestionNumber),

    #[error("assessment already passed")]
    AlreadyPassed,
}

impl InductionError {
    /// Message shown to the user for recoverable validation failures.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            InductionError::InvalidSelection {
                kind: QuestionKind::SingleChoice,
                ..
            } => "You must select an option to continue",
            InductionError::InvalidSelection {
                kind: QuestionKind::MultipleChoice,
                ..
            } => "You must select at least one option to continue",
            InductionError::UnknownOption { .. } | InductionError::OptionOutOfRange { .. } => {
                "Select one of the options shown"
            }
            InductionError::QuestionOutOfRange(_) => "Question not found",
            InductionError::AlreadyPassed => "You have already passed the assessment",
        }
    }
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Result of marking a set of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub passed: bool,
    pub incorrect: Vec<QuestionNumber>,
}

/// What the user sees next after answering a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Question(QuestionNumber),
    Passed,
    NotPassed { incorrect: Vec<QuestionNumber> },
}

/// Details of a scored attempt, for the attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub passed: bool,
    pub attempted_questions: Vec<QuestionNumber>,
    pub incorrect_questions: Vec<QuestionNumber>,
}

/// Outcome of [`Induction::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub state: AssessmentState,
    pub step: NextStep,
    /// Present only when the answers were scored.
    pub attempt: Option<AttemptReport>,
}

/// Everything a question page needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView<'a> {
    pub number: QuestionNumber,
    pub question: &'a Question,
    pub saved_answer: Option<BTreeSet<usize>>,
    pub back_link: Option<QuestionNumber>,
    pub is_final: bool,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Decision logic for the induction assessment over a fixed question bank.
#[derive(Debug, Clone, Copy)]
pub struct Induction<'a> {
    bank: &'a QuestionBank,
}

impl<'a> Induction<'a> {
    #[must_use]
    pub fn new(bank: &'a QuestionBank) -> Self {
        Self { bank }
    }

    #[must_use]
    pub fn bank(&self) -> &'a QuestionBank {
        self.bank
    }

    /// Questions the user is currently working through, in order.
    fn active_sequence(&self, state: &AssessmentState) -> Vec<QuestionNumber> {
        if state.is_remediating() {
            state.wrong_questions().to_vec()
        } else {
            self.bank.numbers().collect()
        }
    }

    /// First question in the active sequence without a recorded answer.
    ///
    /// `None` means every question in the sequence is answered.
    #[must_use]
    pub fn next_unanswered_question(&self, state: &AssessmentState) -> Option<QuestionNumber> {
        self.active_sequence(state)
            .into_iter()
            .find(|number| !state.is_answered(*number))
    }

    /// Where a request for `requested` should be sent instead, if anywhere.
    ///
    /// Jumping ahead past an unanswered question in the active sequence
    /// lands on that question.
    #[must_use]
    pub fn redirect_target(
        &self,
        state: &AssessmentState,
        requested: QuestionNumber,
    ) -> Option<QuestionNumber> {
        for number in self.active_sequence(state) {
            if number == requested {
                return None;
            }
            if !state.is_answered(number) {
                return Some(number);
            }
        }
        None
    }

    /// True when answering `number` completes the current pass.
    #[must_use]
    pub fn is_final_question(&self, state: &AssessmentState, number: QuestionNumber) -> bool {
        match state.wrong_questions().last() {
            Some(last) => *last == number,
            None => number == self.bank.last(),
        }
    }

    /// Target of the "back" link on a question page.
    #[must_use]
    pub fn previous_question(
        &self,
        state: &AssessmentState,
        number: QuestionNumber,
    ) -> Option<QuestionNumber> {
        if number == QuestionNumber::FIRST {
            return None;
        }
        if state.is_remediating() {
            let wrong = state.wrong_questions();
            return match wrong.iter().position(|n| *n == number) {
                Some(0) | None => None,
                Some(pos) => Some(wrong[pos - 1]),
            };
        }
        number.prev()
    }

    /// Build the page model for a question.
    ///
    /// # Errors
    ///
    /// Returns `InductionError::QuestionOutOfRange` for numbers past the bank.
    pub fn question_view(
        &self,
        state: &AssessmentState,
        number: QuestionNumber,
    ) -> Result<QuestionView<'a>, InductionError> {
        let question = self
            .bank
            .question(number)
            .ok_or(InductionError::QuestionOutOfRange(number))?;
        Ok(QuestionView {
            number,
            question,
            saved_answer: state.answer(number).cloned(),
            back_link: self.previous_question(state, number),
            is_final: self.is_final_question(state, number),
        })
    }

    /// Map submitted option strings to option indices.
    ///
    /// # Errors
    ///
    /// Returns `InductionError::UnknownOption` if a value is not one of the
    /// question's options.
    pub fn resolve_selection<S: AsRef<str>>(
        &self,
        number: QuestionNumber,
        selected: &[S],
    ) -> Result<BTreeSet<usize>, InductionError> {
        let question = self
            .bank
            .question(number)
            .ok_or(InductionError::QuestionOutOfRange(number))?;
        selected
            .iter()
            .map(|option| {
                question
                    .option_index(option.as_ref())
                    .ok_or_else(|| InductionError::UnknownOption {
                        number,
                        option: option.as_ref().to_string(),
                    })
            })
            .collect()
    }

    /// Record the selection for one question, returning the updated state.
    ///
    /// # Errors
    ///
    /// Returns `InductionError::InvalidSelection` when nothing was selected
    /// or a single-choice question got several options, `OptionOutOfRange`
    /// for indices past the question's options, `QuestionOutOfRange` for
    /// numbers past the bank, and `AlreadyPassed` once the assessment is
    /// complete.
    pub fn record_answer(
        &self,
        state: &AssessmentState,
        number: QuestionNumber,
        selected: BTreeSet<usize>,
    ) -> Result<AssessmentState, InductionError> {
        let question = self
            .bank
            .question(number)
            .ok_or(InductionError::QuestionOutOfRange(number))?;
        if state.is_passed() {
            return Err(InductionError::AlreadyPassed);
        }
        let too_many = question.kind == QuestionKind::SingleChoice && selected.len() > 1;
        if selected.is_empty() || too_many {
            return Err(InductionError::InvalidSelection {
                number,
                kind: question.kind,
            });
        }
        if let Some(index) = selected.iter().copied().find(|i| *i >= question.options.len()) {
            return Err(InductionError::OptionOutOfRange { number, index });
        }
        Ok(state.with_answer(number, selected))
    }

    /// Mark the given questions against the recorded answers.
    ///
    /// A question without a recorded answer counts as incorrect. Marking an
    /// empty list passes.
    #[must_use]
    pub fn score(&self, answers: &Answers, questions_to_check: &[QuestionNumber]) -> Score {
        let incorrect: Vec<QuestionNumber> = questions_to_check
            .iter()
            .copied()
            .filter(|number| {
                let Some(question) = self.bank.question(*number) else {
                    return true;
                };
                answers
                    .get(number)
                    .is_none_or(|selected| !question.is_answered_by(selected))
            })
            .collect();
        Score {
            passed: incorrect.is_empty(),
            incorrect,
        }
    }

    /// Decide what follows an answer to `number`, scoring when the current
    /// pass is complete.
    #[must_use]
    pub fn advance(&self, state: &AssessmentState, number: QuestionNumber) -> Advance {
        if state.is_passed() {
            return Advance {
                state: state.clone(),
                step: NextStep::Passed,
                attempt: None,
            };
        }

        let wrong = state.wrong_questions();
        if !wrong.is_empty() {
            return match wrong.iter().position(|n| *n == number) {
                Some(pos) if pos + 1 == wrong.len() => self.finish(state, wrong),
                Some(pos) => self.stay(state, NextStep::Question(wrong[pos + 1])),
                None => {
                    let target = self.next_unanswered_question(state).unwrap_or(wrong[0]);
                    self.stay(state, NextStep::Question(target))
                }
            };
        }

        if number == self.bank.last() {
            let all: Vec<QuestionNumber> = self.bank.numbers().collect();
            self.finish(state, &all)
        } else {
            self.stay(state, NextStep::Question(number.next()))
        }
    }

    /// [`Self::record_answer`] followed by [`Self::advance`].
    ///
    /// # Errors
    ///
    /// Propagates validation errors from `record_answer`; the input state is
    /// left as it was.
    pub fn submit(
        &self,
        state: &AssessmentState,
        number: QuestionNumber,
        selected: BTreeSet<usize>,
    ) -> Result<Advance, InductionError> {
        let recorded = self.record_answer(state, number, selected)?;
        Ok(self.advance(&recorded, number))
    }

    /// Questions to list on the "not passed" page.
    #[must_use]
    pub fn not_passed_summary(&self, state: &AssessmentState) -> Vec<(QuestionNumber, &'a str)> {
        state
            .wrong_questions()
            .iter()
            .filter_map(|number| {
                self.bank
                    .question(*number)
                    .map(|q| (*number, q.heading.as_str()))
            })
            .collect()
    }

    fn stay(&self, state: &AssessmentState, step: NextStep) -> Advance {
        Advance {
            state: state.clone(),
            step,
            attempt: None,
        }
    }

    fn finish(&self, state: &AssessmentState, to_check: &[QuestionNumber]) -> Advance {
        let score = self.score(state.answers(), to_check);
        let attempt = AttemptReport {
            passed: score.passed,
            attempted_questions: state.answers().keys().copied().collect(),
            incorrect_questions: score.incorrect.clone(),
        };
        let (next, step) = if score.passed {
            (AssessmentState::passed(), NextStep::Passed)
        } else {
            (
                AssessmentState::remediating(score.incorrect.clone()),
                NextStep::NotPassed {
                    incorrect: score.incorrect,
                },
            )
        };
        Advance {
            state: next,
            step,
            attempt: Some(attempt),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
