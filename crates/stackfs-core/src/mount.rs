// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mount state and the lifecycle coordinator
//!
//! A [`Mount`] owns everything one mounted instance needs: the shared backing
//! filesystem (with its active reference held for the whole lifetime), the
//! option block, the stacked-inode arena, and the collaborator services used
//! by propagation. [`SuperBlock`] models the host's superblock record;
//! teardown takes the mount out of it so nothing can reach freed state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cache::{InodeCache, StackedHandle, StackedInode};
use crate::config::MountOptions;
use crate::error::{FsError, FsResult};
use crate::propagate::ScratchPool;
use crate::types::{
    BackingFs, BackingNode, CredentialStore, PackageRegistry, PathOps, RegistryId,
    REMOUNT_MANDLOCK, REMOUNT_RDONLY, REMOUNT_SILENT,
};

/// Stacked objects one mount can have materialized at once.
const INODE_SLOTS: usize = 1024;

/// `Mounted → Unmounting → TornDown`, no re-entry. The terminal state is
/// reached by [`SuperBlock::put_super`] consuming the mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Mounted,
    Unmounting,
    TornDown,
}

/// Auxiliary bound path plus the owned string copy of it. Holding both in one
/// struct keeps them both-or-neither by construction.
#[derive(Clone, Debug)]
pub struct ObbPath {
    pub path: PathBuf,
    pub raw: String,
}

impl ObbPath {
    pub fn new(path: PathBuf) -> Self {
        let raw = path.to_string_lossy().into_owned();
        Self { path, raw }
    }
}

/// Per-mount state object.
pub struct Mount {
    backing: Arc<dyn BackingFs>,
    path_ops: Arc<dyn PathOps>,
    creds: Arc<dyn CredentialStore>,
    registry: Arc<dyn PackageRegistry>,
    options: RwLock<MountOptions>,
    obb_path: Mutex<Option<ObbPath>>,
    registry_id: Mutex<Option<RegistryId>>,
    inodes: Mutex<InodeCache>,
    state: Mutex<LifecycleState>,
    scratch: ScratchPool,
}

impl Mount {
    /// Build the mount state and take the active reference on the backing
    /// filesystem. The reference is dropped exactly once, in `put_super`.
    pub fn new(
        backing: Arc<dyn BackingFs>,
        path_ops: Arc<dyn PathOps>,
        creds: Arc<dyn CredentialStore>,
        registry: Arc<dyn PackageRegistry>,
        options: MountOptions,
    ) -> Self {
        backing.inc_active();
        Self {
            backing,
            path_ops,
            creds,
            registry,
            options: RwLock::new(options),
            obb_path: Mutex::new(None),
            registry_id: Mutex::new(None),
            inodes: Mutex::new(InodeCache::with_capacity(INODE_SLOTS)),
            state: Mutex::new(LifecycleState::Mounted),
            scratch: ScratchPool::new(),
        }
    }

    pub fn backing(&self) -> &Arc<dyn BackingFs> {
        &self.backing
    }

    pub fn path_ops(&self) -> &Arc<dyn PathOps> {
        &self.path_ops
    }

    pub fn creds(&self) -> &Arc<dyn CredentialStore> {
        &self.creds
    }

    pub(crate) fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    pub fn options(&self) -> RwLockReadGuard<'_, MountOptions> {
        self.options.read().unwrap()
    }

    /// Write access for the host's option parser. Remount itself never goes
    /// through here.
    pub fn options_mut(&self) -> RwLockWriteGuard<'_, MountOptions> {
        self.options.write().unwrap()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap()
    }

    pub fn set_obb_path(&self, path: PathBuf) {
        *self.obb_path.lock().unwrap() = Some(ObbPath::new(path));
    }

    pub fn obb_path(&self) -> Option<ObbPath> {
        self.obb_path.lock().unwrap().clone()
    }

    pub fn set_registry_id(&self, id: RegistryId) {
        *self.registry_id.lock().unwrap() = Some(id);
    }

    // Inode hooks, thin wrappers over the arena.

    pub fn alloc_inode(&self) -> FsResult<StackedHandle> {
        self.inodes.lock().unwrap().allocate()
    }

    pub fn bind_inode(
        &self,
        handle: StackedHandle,
        backing: Arc<dyn BackingNode>,
    ) -> FsResult<()> {
        self.inodes.lock().unwrap().bind(handle, backing)
    }

    pub fn inode(&self, handle: StackedHandle) -> FsResult<StackedInode> {
        self.inodes.lock().unwrap().get(handle).cloned()
    }

    pub fn with_inode_mut<R>(
        &self,
        handle: StackedHandle,
        f: impl FnOnce(&mut StackedInode) -> R,
    ) -> FsResult<R> {
        let mut inodes = self.inodes.lock().unwrap();
        Ok(f(inodes.get_mut(handle)?))
    }

    /// Eviction: clear the binding, return the slot to the pool, and hand the
    /// backing reference to the caller for its final release.
    pub fn evict_inode(&self, handle: StackedHandle) -> FsResult<Arc<dyn BackingNode>> {
        let mut inodes = self.inodes.lock().unwrap();
        let backing = inodes.unbind(handle)?;
        inodes.release(handle)?;
        Ok(backing)
    }

    pub fn inodes_outstanding(&self) -> usize {
        self.inodes.lock().unwrap().outstanding()
    }

    /// Remount accepts only RDONLY, MANDLOCK and SILENT; the host takes care
    /// of ro/rw itself. Anything else left over is an error. Options are
    /// never touched here.
    pub fn remount(&self, flags: u32) -> FsResult<()> {
        if flags & !(REMOUNT_RDONLY | REMOUNT_MANDLOCK | REMOUNT_SILENT) != 0 {
            tracing::error!("remount flags {flags:#x} unsupported");
            return Err(FsError::InvalidArgument);
        }
        Ok(())
    }

    /// Forced-unmount entry point. Forwards the interrupt to the backing
    /// filesystem first, then tears down the registry handle; the registry
    /// references mount state, so it must not outrace an in-flight backing
    /// operation.
    pub fn umount_begin(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != LifecycleState::Mounted {
                return;
            }
            *state = LifecycleState::Unmounting;
        }

        self.backing.umount_begin();

        let id = self.registry_id.lock().unwrap().take();
        if let Some(id) = id {
            let mount_type = self.options().mount_type;
            self.registry.destroy(id, mount_type);
        }
    }

    /// Render the non-default options, `,key=value` style.
    pub fn show_options(&self) -> String {
        let opts = self.options();
        let mut out = String::new();
        if opts.fs_low_uid != 0 {
            out.push_str(&format!(",uid={}", opts.fs_low_uid));
        }
        if opts.fs_low_gid != 0 {
            out.push_str(&format!(",gid={}", opts.fs_low_gid));
        }
        if opts.sdfs_gid != 0 {
            out.push_str(&format!(",sdfs_gid={}", opts.sdfs_gid));
        }
        if opts.sdfs_mask != 0 {
            // Historical rendering: no '=' separator before the value.
            out.push_str(&format!(",sdfs_mask{}", opts.sdfs_mask));
        }
        if opts.multi_user {
            out.push_str(",multi_user");
        }
        if opts.reserved_mb != 0 {
            out.push_str(&format!(",reserved={}MB", opts.reserved_mb));
        }
        out
    }
}

/// The host's superblock record. `fs_info` is the filesystem-specific pointer;
/// teardown clears it so no dangling access is possible afterwards.
pub struct SuperBlock {
    fs_info: Option<Mount>,
}

impl SuperBlock {
    pub fn new(mount: Mount) -> Self {
        Self { fs_info: Some(mount) }
    }

    pub fn mount(&self) -> Option<&Mount> {
        self.fs_info.as_ref()
    }

    /// Final actions when unmounting: release the obb path binding and its
    /// string together, drain the inode arena (loud on leaks), and drop the
    /// backing active reference exactly once. Calling this again is a no-op.
    pub fn put_super(&mut self) {
        let Some(mount) = self.fs_info.take() else {
            return;
        };
        *mount.state.lock().unwrap() = LifecycleState::TornDown;

        let Mount {
            backing,
            obb_path,
            inodes,
            options,
            ..
        } = mount;

        drop(obb_path.into_inner().unwrap());
        drop(options.into_inner().unwrap());
        inodes.into_inner().unwrap().destroy();
        backing.dec_active();
    }
}
