pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod process;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use pipeline::{Pipeline, RunSummary};
