mod assessment;
mod ids;
mod question;
mod role;

pub use assessment::{Answers, AssessmentPhase, AssessmentState, AssessmentStateError};
pub use ids::{ParseQuestionNumberError, QuestionNumber, UserHash};
pub use question::{Question, QuestionBank, QuestionBankError, QuestionKind};
pub use role::{Role, RoleChangePlan, RoleChangeRequest, RoleError, RoleSet};
