//! Rover Runner
//!
//! Starts subgraphs locally or against Apollo Studio, composes them into
//! supergraphs and runs `rover dev` in front of them.

pub mod commands;
pub mod health;
pub mod launch;
pub mod lifecycle;
pub mod orchestrator;
pub mod prompt;
pub mod redis;
pub mod rover;
pub mod shell;
pub mod studio;
pub mod terminal;

#[cfg(test)]
pub(crate) mod test_support;
