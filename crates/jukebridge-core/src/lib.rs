pub mod command;
pub mod config;
pub mod status;
pub mod topic;

mod error;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
