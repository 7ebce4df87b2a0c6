//! Adapters for the external tools the pipeline drives.
//!
//! Both adapters run their tool as a subprocess and fold stderr into the
//! returned error on a non-zero exit, so diagnostics always carry the
//! tool's own explanation.

pub mod build;
pub mod git;

pub use build::BuildTool;
pub use git::GitFetcher;
