#![forbid(unsafe_code)]

pub mod error;
pub mod induction;
pub mod model;
pub mod roles;
pub mod time;

pub use error::Error;
pub use induction::{Advance, AttemptReport, Induction, InductionError, NextStep, QuestionView, Score};
pub use time::Clock;
