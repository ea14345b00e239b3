//! Shared testing utilities: in-memory mock repositories and test data
//! builders used across the workspace.
//!
//! Add as a dev-dependency and pull in what the test needs:
//!
//! ```toml
//! [dev-dependencies]
//! pipeflow-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
