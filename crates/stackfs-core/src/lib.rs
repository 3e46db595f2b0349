// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! StackFS Core — stacked-filesystem identity binding, capacity reservation,
//! and cross-view propagation
//!
//! This crate is the core of a stackable filesystem overlay: it binds stacked
//! inode objects 1:1 to the backing inodes they shadow, hides an
//! administrator-configured reservation from free-space reporting, and replays
//! completed destructive namespace operations across the parallel projections
//! of a mounted view. The host's path resolution, permission translation, and
//! option parsing stay outside, behind the collaborator traits in [`types`].

pub mod cache;
pub mod config;
pub mod error;
pub mod mount;
pub mod propagate;
pub mod statfs;
pub mod testing;
pub mod types;


// Re-export key types
pub use cache::{InodeCache, StackedHandle, StackedInode};
pub use config::MountOptions;
pub use error::{FsError, FsResult};
pub use mount::{LifecycleState, Mount, ObbPath, SuperBlock};
pub use propagate::{projection_prefixes, propagate_rename, propagate_unlink};
pub use statfs::adjusted_statfs;
pub use types::{
    BackingFs, BackingNode, Credential, CredentialStore, MountType, PackageRegistry, PathOps,
    RegistryId, ScopedCredentials, StatVfs, PATH_MAX, REMOUNT_MANDLOCK, REMOUNT_RDONLY,
    REMOUNT_SILENT, RENAME_NOPROPAGATE, STACKFS_SUPER_MAGIC,
};
