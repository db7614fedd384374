// src/participation/mod.rs

//! Taking a survey: starting, answering question by question, completing.

pub mod error;
pub mod evaluate;
pub mod service;
pub mod walkthrough;

pub use error::ParticipationError;
pub use evaluate::{Evaluation, PendingAnswer, PendingContent, evaluate};
pub use service::ParticipationService;
pub use walkthrough::{AnswerTransport, Step, Walkthrough};
