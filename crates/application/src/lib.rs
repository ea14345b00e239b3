//! Application services: pipeline catalog, version activation, run
//! lifecycle, ownership and tagging, composed over the repository
//! abstractions.

pub mod services;

pub use services::{
    OwnershipGuard, PipelineService, RunService, TagService, UserService, VersionService,
};
