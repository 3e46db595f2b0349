// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stacked inode objects and the fixed-capacity arena they are recycled
//! through.
//!
//! Each stacked inode shadows exactly one backing inode. The counted backing
//! reference (an owned `Arc`) is held for exactly the lifetime of the binding:
//! `bind` stores it, `unbind` moves it back out for the caller to release.
//! Releasing a slot that is still bound is rejected — that is the leak guard.

use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::types::BackingNode;

/// Typed handle into the arena. The generation counter catches stale handles
/// after a slot has been recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StackedHandle {
    index: usize,
    generation: u64,
}

/// The overlay's own inode representation, bound 1:1 to a backing inode.
#[derive(Clone)]
pub struct StackedInode {
    backing: Option<Arc<dyn BackingNode>>,
    /// Starts at 1 on every allocation; bumped by the host on namespace
    /// changes.
    pub version: u64,
    /// Stacked-only fields, zeroed on allocation.
    pub userid: u32,
    pub owner_uid: u32,
    pub under_obb: bool,
}

impl StackedInode {
    fn fresh() -> Self {
        Self {
            backing: None,
            version: 1,
            userid: 0,
            owner_uid: 0,
            under_obb: false,
        }
    }

    pub fn backing(&self) -> Option<&Arc<dyn BackingNode>> {
        self.backing.as_ref()
    }
}

struct Slot {
    generation: u64,
    inode: Option<StackedInode>,
}

/// Fixed-capacity arena of stacked inode objects with an explicit free list.
pub struct InodeCache {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl InodeCache {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot { generation: 0, inode: None });
        }
        // Pop order is highest-index first; irrelevant to callers.
        let free = (0..capacity).collect();
        Self { slots, free }
    }

    /// Take a zero-initialized stacked object from the pool.
    pub fn allocate(&mut self) -> FsResult<StackedHandle> {
        let index = self.free.pop().ok_or(FsError::OutOfMemory)?;
        let slot = &mut self.slots[index];
        slot.inode = Some(StackedInode::fresh());
        Ok(StackedHandle { index, generation: slot.generation })
    }

    fn slot(&self, handle: StackedHandle) -> FsResult<&Slot> {
        let slot = self.slots.get(handle.index).ok_or(FsError::InvalidArgument)?;
        if slot.generation != handle.generation || slot.inode.is_none() {
            return Err(FsError::InvalidArgument);
        }
        Ok(slot)
    }

    fn slot_mut(&mut self, handle: StackedHandle) -> FsResult<&mut Slot> {
        let slot = self.slots.get_mut(handle.index).ok_or(FsError::InvalidArgument)?;
        if slot.generation != handle.generation || slot.inode.is_none() {
            return Err(FsError::InvalidArgument);
        }
        Ok(slot)
    }

    pub fn get(&self, handle: StackedHandle) -> FsResult<&StackedInode> {
        Ok(self.slot(handle)?.inode.as_ref().unwrap())
    }

    pub fn get_mut(&mut self, handle: StackedHandle) -> FsResult<&mut StackedInode> {
        Ok(self.slot_mut(handle)?.inode.as_mut().unwrap())
    }

    /// Store the backing reference. The caller already holds the reference;
    /// ownership moves into the stacked object here.
    pub fn bind(&mut self, handle: StackedHandle, backing: Arc<dyn BackingNode>) -> FsResult<()> {
        let inode = self.get_mut(handle)?;
        if inode.backing.is_some() {
            return Err(FsError::InvalidArgument);
        }
        inode.backing = Some(backing);
        Ok(())
    }

    /// Clear the stored backing reference and hand it back for release by the
    /// caller.
    pub fn unbind(&mut self, handle: StackedHandle) -> FsResult<Arc<dyn BackingNode>> {
        let inode = self.get_mut(handle)?;
        inode.backing.take().ok_or(FsError::InvalidArgument)
    }

    /// Return the object to the pool. The slot must be unbound first;
    /// releasing a bound object would leak its backing reference.
    pub fn release(&mut self, handle: StackedHandle) -> FsResult<()> {
        let slot = self.slot_mut(handle)?;
        if slot.inode.as_ref().unwrap().backing.is_some() {
            return Err(FsError::InvalidArgument);
        }
        slot.inode = None;
        slot.generation += 1;
        self.free.push(handle.index);
        Ok(())
    }

    /// Objects currently allocated out of the pool.
    pub fn outstanding(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Free the pool. Outstanding objects are a bug in the caller; they are
    /// reported, not silently dropped.
    pub fn destroy(self) -> usize {
        let leaked = self.outstanding();
        if leaked != 0 {
            tracing::error!(leaked, "inode cache destroyed with objects still outstanding");
        }
        leaked
    }
}
