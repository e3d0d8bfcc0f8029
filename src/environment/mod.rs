//! Environment Management Module
//!
//! Handles the conda installation that hosts third-party tools, the
//! package manifests installed into it, and the scoped directory used
//! while installing.

pub mod conda;
pub mod packages;
pub mod shell;
pub mod workdir;

pub use conda::{conda_bin, missing_channels, CondaClient, InstalledPackage};
pub use packages::{split_by_env, PackageManifest, PackageSpec};
pub use shell::{run_checked, run_shell, wget};
pub use workdir::ScopedWorkDir;
