// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Recording mock collaborators for StackFS Core tests
//!
//! These mocks count, record, and optionally fail; ordering-sensitive tests
//! share an [`EventLog`] between collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{FsError, FsResult};
use crate::types::{
    BackingFs, BackingNode, Credential, CredentialStore, MountType, PackageRegistry, PathOps,
    RegistryId, StatVfs,
};

/// Shared, append-only log for cross-collaborator ordering assertions.
pub struct EventLog {
    entries: Mutex<Vec<&'static str>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    pub fn record(&self, entry: &'static str) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn snapshot(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().clone()
    }
}

/// Backing filesystem stub with an observable active-reference count.
pub struct StubBackingFs {
    stat: Mutex<StatVfs>,
    active: AtomicI64,
    log: Option<Arc<EventLog>>,
}

impl StubBackingFs {
    pub fn new() -> Self {
        Self {
            stat: Mutex::new(StatVfs::default()),
            active: AtomicI64::new(0),
            log: None,
        }
    }

    pub fn with_stat(self, stat: StatVfs) -> Self {
        *self.stat.lock().unwrap() = stat;
        self
    }

    pub fn with_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }
}

impl BackingFs for StubBackingFs {
    fn statfs(&self) -> FsResult<StatVfs> {
        Ok(*self.stat.lock().unwrap())
    }

    fn inc_active(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn dec_active(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn umount_begin(&self) {
        if let Some(log) = &self.log {
            log.record("backing umount_begin");
        }
    }
}

/// Credential store that hands out unique tokens and balances them.
pub struct CountingCreds {
    next: AtomicU64,
    outstanding: AtomicI64,
    total: AtomicU64,
    fail: AtomicBool,
    identities: Mutex<Vec<(u32, u32)>>,
}

impl CountingCreds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            outstanding: AtomicI64::new(0),
            total: AtomicU64::new(0),
            fail: AtomicBool::new(false),
            identities: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let creds = Self::new();
        creds.fail.store(true, Ordering::SeqCst);
        creds
    }

    /// Tokens acquired and not yet restored.
    pub fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn total_acquired(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// The (uid, gid) pairs substitution was requested for, in order.
    pub fn identities(&self) -> Vec<(u32, u32)> {
        self.identities.lock().unwrap().clone()
    }
}

impl CredentialStore for CountingCreds {
    fn acquire(&self, uid: u32, gid: u32) -> FsResult<Credential> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FsError::OutOfMemory);
        }
        self.identities.lock().unwrap().push((uid, gid));
        self.total.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Credential(self.next.fetch_add(1, Ordering::SeqCst)))
    }

    fn restore(&self, _cred: Credential) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One recorded path operation, with the identity it ran under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordingOp {
    Unlink {
        cred: Credential,
        path: PathBuf,
    },
    Rename {
        cred: Credential,
        old: PathBuf,
        new: PathBuf,
        flags: u32,
    },
}

/// Path-operation collaborator that records every call and can be told to
/// fail for specific paths (unlink path, or rename source).
pub struct RecordingPathOps {
    ops: Mutex<Vec<RecordingOp>>,
    fail_paths: Mutex<Vec<PathBuf>>,
}

impl RecordingPathOps {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            fail_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, path: &str) {
        self.fail_paths.lock().unwrap().push(PathBuf::from(path));
    }

    pub fn ops(&self) -> Vec<RecordingOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn unlink_paths(&self) -> Vec<PathBuf> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RecordingOp::Unlink { path, .. } => Some(path),
                RecordingOp::Rename { .. } => None,
            })
            .collect()
    }

    fn should_fail(&self, path: &Path) -> bool {
        self.fail_paths.lock().unwrap().iter().any(|p| p == path)
    }
}

impl PathOps for RecordingPathOps {
    fn unlink_at(&self, cred: Credential, path: &Path) -> FsResult<()> {
        self.ops.lock().unwrap().push(RecordingOp::Unlink {
            cred,
            path: path.to_path_buf(),
        });
        if self.should_fail(path) {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    fn rename_at(&self, cred: Credential, old: &Path, new: &Path, flags: u32) -> FsResult<()> {
        self.ops.lock().unwrap().push(RecordingOp::Rename {
            cred,
            old: old.to_path_buf(),
            new: new.to_path_buf(),
            flags,
        });
        if self.should_fail(old) {
            return Err(FsError::NotFound);
        }
        Ok(())
    }
}

/// Registry collaborator recording teardown calls.
pub struct RecordingRegistry {
    destroyed: Mutex<Vec<(RegistryId, MountType)>>,
    log: Option<Arc<EventLog>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            destroyed: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn destroyed(&self) -> Vec<(RegistryId, MountType)> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl PackageRegistry for RecordingRegistry {
    fn destroy(&self, id: RegistryId, mount_type: MountType) {
        if let Some(log) = &self.log {
            log.record("registry destroy");
        }
        self.destroyed.lock().unwrap().push((id, mount_type));
    }
}

/// Minimal backing inode; `Arc::strong_count` on it makes reference-lifetime
/// assertions direct.
pub struct TestNode {
    ino: u64,
}

impl TestNode {
    pub fn arc(ino: u64) -> Arc<TestNode> {
        Arc::new(TestNode { ino })
    }
}

impl BackingNode for TestNode {
    fn ino(&self) -> u64 {
        self.ino
    }
}
