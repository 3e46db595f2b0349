// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for StackFS

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FsResult;

/// Filesystem type tag reported by `adjusted_statfs` so user tooling does not
/// mistake a stacked mount for the backing filesystem.
pub const STACKFS_SUPER_MAGIC: u64 = 0xb550_ca10;

/// Maximum synthesized path length.
pub const PATH_MAX: usize = 4096;

/// Remount flags the coordinator accepts. Anything outside this set is an
/// error; the host handles ro/rw transitions itself.
pub const REMOUNT_RDONLY: u32 = 0x0001;
pub const REMOUNT_MANDLOCK: u32 = 0x0040;
pub const REMOUNT_SILENT: u32 = 0x8000;

/// Rename flag suppressing the projection's own propagation hooks, so a
/// replayed rename cannot re-trigger fan-out.
pub const RENAME_NOPROPAGATE: u32 = 1 << 0;

/// Classification of a mounted view; selects which parallel projections a
/// destructive operation is replayed onto.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountType {
    #[default]
    None,
    Default,
    Read,
    Write,
    Full,
}

/// Filesystem statistics, in blocks of `bsize` bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatVfs {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u64,
    pub fs_type: u64,
}

/// Opaque token representing a substituted privilege context obtained from a
/// [`CredentialStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Credential(pub u64);

/// Opaque handle into the external package-classification registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegistryId(pub u64);

/// Credential-substitution service. The store hands out an opaque token for a
/// substituted identity; every token must be returned via `restore`.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Acquire a substituted identity; fails with `OutOfMemory` if the
    /// substitution cannot be obtained.
    fn acquire(&self, uid: u32, gid: u32) -> FsResult<Credential>;

    /// Return a previously acquired identity.
    fn restore(&self, cred: Credential);
}

/// Scoped credential substitution. Restores the original identity when
/// dropped, on every exit path.
pub struct ScopedCredentials<'a> {
    store: &'a dyn CredentialStore,
    cred: Credential,
}

impl<'a> ScopedCredentials<'a> {
    pub fn acquire(store: &'a dyn CredentialStore, uid: u32, gid: u32) -> FsResult<Self> {
        let cred = store.acquire(uid, gid)?;
        Ok(Self { store, cred })
    }

    /// The substituted identity, threaded into each projection call.
    pub fn token(&self) -> Credential {
        self.cred
    }
}

impl std::fmt::Debug for ScopedCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedCredentials")
            .field("cred", &self.cred)
            .finish_non_exhaustive()
    }
}

impl Drop for ScopedCredentials<'_> {
    fn drop(&mut self) {
        self.store.restore(self.cred);
    }
}

/// Path-level destructive primitives of the host, performed under an explicit
/// substituted identity.
#[cfg_attr(test, mockall::automock)]
pub trait PathOps: Send + Sync {
    /// Delete the object at `path`.
    fn unlink_at(&self, cred: Credential, path: &Path) -> FsResult<()>;

    /// Rename `old` to `new`. `flags` may carry [`RENAME_NOPROPAGATE`].
    fn rename_at(&self, cred: Credential, old: &Path, new: &Path, flags: u32) -> FsResult<()>;
}

/// The underlying filesystem's root state, shared across every mount stacked
/// on top of it.
#[cfg_attr(test, mockall::automock)]
pub trait BackingFs: Send + Sync {
    /// Query the backing filesystem's statistics.
    fn statfs(&self) -> FsResult<StatVfs>;

    /// Increment the active-reference count. Held for the mount's lifetime.
    fn inc_active(&self);

    /// Decrement the active-reference count. Called exactly once at teardown.
    fn dec_active(&self);

    /// Interrupt in-flight backing operations ahead of a forced unmount.
    /// Backings without such a hook leave the default no-op in place.
    fn umount_begin(&self) {}
}

/// A backing inode shadowed by exactly one stacked object. The `Arc` holding
/// it is the counted reference the stacked object owns.
pub trait BackingNode: Send + Sync {
    fn ino(&self) -> u64;
}

/// Package-classification registry, consumed as an opaque teardown hook.
#[cfg_attr(test, mockall::automock)]
pub trait PackageRegistry: Send + Sync {
    fn destroy(&self, id: RegistryId, mount_type: MountType);
}
