//! Pipeline catalog and run lifecycle management core.
//!
//! Versioned pipeline definitions, the single-active-version invariant,
//! the run state machine, multi-owner authorization and polymorphic
//! tagging, over SQLite or Postgres. HTTP routing, credential handling
//! and actual pipeline execution live outside this crate.

pub mod app;

pub use app::App;
pub use pipeflow_application::{
    OwnershipGuard, PipelineService, RunService, TagService, UserService, VersionService,
};
pub use pipeflow_core::{AppConfig, init_logging};
pub use pipeflow_domain as domain;
pub use pipeflow_errors::{PipeflowError, PipeflowResult};
pub use pipeflow_infrastructure::{DatabaseManager, DatabaseType};
