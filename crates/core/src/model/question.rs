use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionNumber;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a question bank is rejected at load time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("question bank is empty")]
    Empty,

    #[error("question bank has too many questions: {len}")]
    TooManyQuestions { len: usize },

    #[error("question {number} has no options")]
    NoOptions { number: u16 },

    #[error("question {number} repeats option {option:?}")]
    DuplicateOption { number: u16, option: String },

    #[error("question {number} has no correct answers")]
    NoAnswers { number: u16 },

    #[error("question {number} lists answer {answer:?} which is not an option")]
    AnswerNotAnOption { number: u16, answer: String },

    #[error("single choice question {number} must have exactly one answer, found {count}")]
    SingleChoiceAnswerCount { number: u16, count: usize },

    #[error("could not parse question bank: {0}")]
    Parse(String),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Whether a question takes one selection (radio) or several (checkboxes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
}

/// A single induction question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtext: Option<String>,
    pub options: Vec<String>,
    pub answers: Vec<String>,
}

impl Question {
    /// Look up the option text for an index.
    #[must_use]
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    /// Position of an option string within this question.
    #[must_use]
    pub fn option_index(&self, option: &str) -> Option<usize> {
        self.options.iter().position(|o| o == option)
    }

    /// True when the selected indices name exactly the correct answers.
    ///
    /// Comparison is by option text as an unordered set. An index outside
    /// the option list never matches.
    #[must_use]
    pub fn is_answered_by(&self, selected: &BTreeSet<usize>) -> bool {
        let mut chosen = BTreeSet::new();
        for &index in selected {
            match self.option(index) {
                Some(text) => {
                    chosen.insert(text);
                }
                None => return false,
            }
        }
        let correct: BTreeSet<&str> = self.answers.iter().map(String::as_str).collect();
        chosen == correct
    }

    fn validate(&self, number: u16) -> Result<(), QuestionBankError> {
        if self.options.is_empty() {
            return Err(QuestionBankError::NoOptions { number });
        }
        let mut seen = BTreeSet::new();
        for option in &self.options {
            if !seen.insert(option.as_str()) {
                return Err(QuestionBankError::DuplicateOption {
                    number,
                    option: option.clone(),
                });
            }
        }
        if self.answers.is_empty() {
            return Err(QuestionBankError::NoAnswers { number });
        }
        if let Some(answer) = self.answers.iter().find(|a| !seen.contains(a.as_str())) {
            return Err(QuestionBankError::AnswerNotAnOption {
                number,
                answer: answer.clone(),
            });
        }
        if self.kind == QuestionKind::SingleChoice && self.answers.len() != 1 {
            return Err(QuestionBankError::SingleChoiceAnswerCount {
                number,
                count: self.answers.len(),
            });
        }
        Ok(())
    }
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// Ordered, read-only list of induction questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a validated bank.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` if the bank is empty or any question is malformed.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        if questions.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        if u16::try_from(questions.len()).is_err() {
            return Err(QuestionBankError::TooManyQuestions {
                len: questions.len(),
            });
        }
        for (number, question) in (1_u16..).zip(&questions) {
            question.validate(number)?;
        }
        Ok(Self { questions })
    }

    /// Parse a bank from its JSON form (an array of questions).
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Parse` for malformed JSON, or a validation error.
    pub fn from_json(raw: &str) -> Result<Self, QuestionBankError> {
        let questions: Vec<Question> =
            serde_json::from_str(raw).map_err(|err| QuestionBankError::Parse(err.to_string()))?;
        Self::new(questions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The last question number in this bank.
    #[must_use]
    pub fn last(&self) -> QuestionNumber {
        // Length is checked against u16 and non-zero in `new`.
        let len = u16::try_from(self.questions.len()).unwrap_or(u16::MAX);
        QuestionNumber::new(len).unwrap_or(QuestionNumber::FIRST)
    }

    /// All question numbers in order.
    pub fn numbers(&self) -> impl Iterator<Item = QuestionNumber> + '_ {
        (1..=self.last().value()).filter_map(QuestionNumber::new)
    }

    /// True when the number addresses a question in this bank.
    #[must_use]
    pub fn contains(&self, number: QuestionNumber) -> bool {
        number <= self.last()
    }

    /// Fetch a question by number.
    #[must_use]
    pub fn question(&self, number: QuestionNumber) -> Option<&Question> {
        self.questions.get(number.index())
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self {
            questions: default_questions(),
        }
    }
}

fn single(heading: &str, subtext: Option<&str>, options: &[&str], answer: &str) -> Question {
    Question {
        kind: QuestionKind::SingleChoice,
        heading: heading.to_string(),
        subtext: subtext.map(str::to_string),
        options: options.iter().map(|o| (*o).to_string()).collect(),
        answers: vec![answer.to_string()],
    }
}

fn multiple(heading: &str, options: &[&str], answers: &[&str]) -> Question {
    Question {
        kind: QuestionKind::MultipleChoice,
        heading: heading.to_string(),
        subtext: Some("Select all that apply.".to_string()),
        options: options.iter().map(|o| (*o).to_string()).collect(),
        answers: answers.iter().map(|a| (*a).to_string()).collect(),
    }
}

const HOME_FOLDER_ANSWER: &str = "Users should store files they want to persist in the 'Home Folder'. The 'Collab Storage' drive should be used sparingly and for small files as overuse will increase the load time of the virtual machine for all users.";
const SAFE_OUTPUT_CONTEXT: &str = "When clear context is given";
const SAFE_OUTPUT_COUNTS: &str =
    "Counts under 10 are suppressed and all counts greater than 10 are rounded to the nearest 5";
const SAFE_OUTPUT_PUBLIC: &str =
    "Analytical results that you would expect to see in the public domain";
const SCREENSHOTS: &str = "Taking screenshots of data";
const MANUAL_COPY: &str = "Bypassing the Output your Results service by manually writing down data";
const SCREEN_SHARE: &str = "Screen sharing with someone who doesn't have access to the SDE";

/// The secure data environment induction assessment.
fn default_questions() -> Vec<Question> {
    vec![
        single(
            "What does the 'SDE' stand for?",
            None,
            &[
                "The Standard Developer Environment",
                "The Secure Data Environment",
                "The Safe Data and Engineering",
            ],
            "The Secure Data Environment",
        ),
        single(
            "Which of the Five Safes does the following quote refer to?",
            Some(
                "\"Data confidentiality is always maintained, and data protection best practice is always followed in relation to any code or results taken out of the environment\"",
            ),
            &[
                "Safe data",
                "Safe projects",
                "Safe people",
                "Safe settings",
                "Safe outputs",
            ],
            "Safe outputs",
        ),
        single(
            "Which statement is correct?",
            None,
            &[
                HOME_FOLDER_ANSWER,
                "Users should store all files in the 'Collab Storage' drive",
                "All files persist in the SDE, so users do not need to store them anywhere.",
            ],
            HOME_FOLDER_ANSWER,
        ),
        single(
            "'Version control' is the process of tracking and managing changes to files",
            None,
            &["True", "False"],
            "True",
        ),
        single(
            "How do most users access data stored in the SDE?",
            None,
            &["With Databricks", "With Gitlab", "With RStudio"],
            "With Databricks",
        ),
        single(
            "Which of the following is an acceptable type of data to import?",
            None,
            &[
                "A list of names and addresses",
                "Clinical codelist of SNOMED codes",
                "Patient level data in a csv file",
            ],
            "Clinical codelist of SNOMED codes",
        ),
        multiple(
            "What is considered a safe output?",
            &[
                SAFE_OUTPUT_CONTEXT,
                "The output is unreasonably long",
                SAFE_OUTPUT_COUNTS,
                SAFE_OUTPUT_PUBLIC,
                "The output contains personally identifiable information",
                "There is undeclared data in a code output",
            ],
            &[SAFE_OUTPUT_CONTEXT, SAFE_OUTPUT_COUNTS, SAFE_OUTPUT_PUBLIC],
        ),
        multiple(
            "Which of the following are unacceptable methods of outputting from the SDE?",
            &[
                SCREENSHOTS,
                "Using the Output your Results service",
                MANUAL_COPY,
                SCREEN_SHARE,
            ],
            &[SCREENSHOTS, MANUAL_COPY, SCREEN_SHARE],
        ),
        single(
            "There is one writable collaborative database, which enables you to save tables for all colleagues to see and access",
            None,
            &["True", "False"],
            "True",
        ),
        multiple(
            "Where can SDE users go for help and support?",
            &[
                "Summary notebooks",
                "Online drop-in sessions",
                "Online guidance",
                "The SDE Service team via email",
            ],
            &[
                "Summary notebooks",
                "Online drop-in sessions",
                "Online guidance",
                "The SDE Service team via email",
            ],
        ),
    ]
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: u16) -> QuestionNumber {
        QuestionNumber::new(n).unwrap()
    }

    #[test]
    fn default_bank_is_valid_and_has_ten_questions() {
        let bank = QuestionBank::default();
        assert_eq!(bank.len(), 10);
        assert_eq!(bank.last(), q(10));
        assert_eq!(QuestionBank::new(bank.questions().to_vec()).unwrap(), bank);
    }

    #[test]
    fn numbers_cover_whole_bank() {
        let bank = QuestionBank::default();
        let numbers: Vec<u16> = bank.numbers().map(QuestionNumber::value).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
        assert!(bank.contains(q(10)));
        assert!(!bank.contains(q(11)));
        assert!(bank.question(q(11)).is_none());
    }

    #[test]
    fn answer_matching_ignores_selection_order() {
        let bank = QuestionBank::default();
        let question = bank.question(q(8)).unwrap();
        let forwards: BTreeSet<usize> = [0, 2, 3].into_iter().collect();
        let backwards: BTreeSet<usize> = [3, 2, 0].into_iter().collect();
        assert!(question.is_answered_by(&forwards));
        assert!(question.is_answered_by(&backwards));
    }

    #[test]
    fn answer_matching_rejects_subsets_and_supersets() {
        let bank = QuestionBank::default();
        let question = bank.question(q(8)).unwrap();
        assert!(!question.is_answered_by(&[0, 2].into_iter().collect()));
        assert!(!question.is_answered_by(&[0, 1, 2, 3].into_iter().collect()));
        assert!(!question.is_answered_by(&[0, 2, 3, 99].into_iter().collect()));
    }

    #[test]
    fn rejects_empty_bank() {
        assert_eq!(QuestionBank::new(Vec::new()), Err(QuestionBankError::Empty));
    }

    #[test]
    fn rejects_answer_missing_from_options() {
        let question = single("Heading", None, &["A", "B"], "C");
        let err = QuestionBank::new(vec![question]).unwrap_err();
        assert!(matches!(err, QuestionBankError::AnswerNotAnOption { number: 1, .. }));
    }

    #[test]
    fn rejects_single_choice_with_two_answers() {
        let mut question = single("Heading", None, &["A", "B"], "A");
        question.answers.push("B".into());
        let err = QuestionBank::new(vec![question]).unwrap_err();
        assert_eq!(
            err,
            QuestionBankError::SingleChoiceAnswerCount {
                number: 1,
                count: 2
            }
        );
    }

    #[test]
    fn rejects_duplicate_options() {
        let question = single("Heading", None, &["A", "A"], "A");
        let err = QuestionBank::new(vec![question]).unwrap_err();
        assert!(matches!(err, QuestionBankError::DuplicateOption { number: 1, .. }));
    }

    #[test]
    fn parses_json_bank() {
        let raw = r#"[
            {"type": "SINGLE_CHOICE", "heading": "Pick", "options": ["yes", "no"], "answers": ["yes"]},
            {"type": "MULTIPLE_CHOICE", "heading": "Pick some", "subtext": "Select all that apply.",
             "options": ["a", "b", "c"], "answers": ["a", "c"]}
        ]"#;
        let bank = QuestionBank::from_json(raw).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.question(q(2)).unwrap().kind, QuestionKind::MultipleChoice);
        assert_eq!(bank.question(q(1)).unwrap().subtext, None);
    }

    #[test]
    fn reports_unparsable_json() {
        let err = QuestionBank::from_json("{not json").unwrap_err();
        assert!(matches!(err, QuestionBankError::Parse(_)));
    }
}
