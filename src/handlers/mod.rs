// src/handlers/mod.rs

pub mod invitation;
pub mod participation;
pub mod report;
pub mod surveys;
