//! tedbench — orchestrates build-and-benchmark sweeps of a tetrahedral-mesh
//! simulation across software versions and problem sizes, then extracts and
//! graphs the captured performance numbers.
//!
//! Pipeline: [`config`] → [`planner`] → [`script`] → [`session`] on a
//! [`target`] (fire-and-forget), then in a later invocation [`session`]
//! (fetch) → [`logparse`] → [`report`].

pub mod cli;
pub mod config;
pub mod error;
pub mod expr;
pub mod history;
pub mod logparse;
pub mod planner;
pub mod report;
pub mod script;
pub mod session;
pub mod target;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::{BenchmarkParams, Config, VersionRecord};
pub use error::{Result, TedbenchError};
pub use planner::MatrixPlan;
