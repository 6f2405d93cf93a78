//! cfnboot-lib: declarative host reconciliation for cloud bootstrap.
//!
//! This crate converges a freshly provisioned machine to the state described
//! by a CloudFormation-style metadata document:
//! - `exec`: running commands under a scoped effective user
//! - `packages`, `sources`, `files`, `accounts`, `commands`, `services`:
//!   the per-category handlers of a config section
//! - `configsets`: expanding a configSet selection into section names
//! - `metadata` / `snapshot`: retrieving the document and persisting the last
//!   applied copy for drift detection
//! - `hooks`: cfn-hup hook configuration and event dispatch
//! - `engine`: one `apply` (cfn-init) or `hup_pass` (cfn-hup) pass

pub mod accounts;
pub mod commands;
pub mod configsets;
pub mod consts;
pub mod engine;
pub mod exec;
pub mod files;
pub mod hooks;
pub mod metadata;
pub mod packages;
pub mod paths;
pub mod services;
pub mod snapshot;
pub mod sources;
pub mod util;
