//! Core generation engine: schema types, naming, context, scheduling, persistence.

pub mod context;
pub mod digest;
pub mod error;
pub mod executor;
pub mod names;
pub mod parser;
pub mod planner;
pub mod producer;
pub mod resource;
pub mod scheduler;
pub mod state;
pub mod types;
