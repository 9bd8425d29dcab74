//! cloudgen: application schema to infrastructure resource graph.
//!
//! Producers publish typed, memoized outputs into a pass-scoped context and
//! are driven to a fixed point by a sweeping scheduler. Access declarations
//! are reduced to least-privilege grants before generation starts.

pub mod cli;
pub mod core;
pub mod logging;
pub mod permissions;
pub mod producers;
