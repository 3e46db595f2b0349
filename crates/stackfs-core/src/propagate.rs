// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! View propagation engine
//!
//! After a destructive operation (unlink, rename) completes on the primary
//! stacked view, the host calls back in here to replay it across the parallel
//! projections of the same logical name. Which projection roots are active is
//! a function of the mount type alone:
//!
//! | mount type            | `/mnt/runtime/default` | `/mnt/runtime/read` | `/mnt/runtime/write` | `/storage` |
//! |-----------------------|------------------------|---------------------|----------------------|------------|
//! | `None`                | -                      | -                   | -                    | -          |
//! | `Default`             | -                      | yes                 | yes                  | yes        |
//! | `Read`                | yes                    | -                   | yes                  | yes        |
//! | `Write`               | yes                    | yes                 | -                    | yes        |
//! | `Full`                | yes                    | yes                 | yes                  | yes        |
//!
//! Fan-out is best-effort: a projection missing the path does not stop the
//! remaining projections, and the returned status is that of the last
//! attempted projection. Callers must not read the return value as "all
//! projections succeeded" — the primary operation already completed before
//! this engine runs.

use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{FsError, FsResult};
use crate::mount::Mount;
use crate::types::{MountType, ScopedCredentials, PATH_MAX, RENAME_NOPROPAGATE};

/// Path buffers available per mount; a rename holds two at once.
pub(crate) const SCRATCH_BUFFERS: usize = 8;

/// Fixed pool of reusable path-synthesis buffers, each sized to [`PATH_MAX`].
pub(crate) struct ScratchPool {
    buffers: Mutex<Vec<String>>,
}

impl ScratchPool {
    pub(crate) fn new() -> Self {
        let buffers = (0..SCRATCH_BUFFERS).map(|_| String::with_capacity(PATH_MAX)).collect();
        Self { buffers: Mutex::new(buffers) }
    }

    pub(crate) fn acquire(&self) -> FsResult<ScratchBuf<'_>> {
        match self.buffers.lock().unwrap().pop() {
            Some(buf) => Ok(ScratchBuf { pool: self, buf: Some(buf) }),
            None => {
                tracing::error!("propagation path buffer pool exhausted");
                Err(FsError::OutOfMemory)
            }
        }
    }
}

/// A pooled buffer; returns itself to the pool on drop.
pub(crate) struct ScratchBuf<'a> {
    pool: &'a ScratchPool,
    buf: Option<String>,
}

impl Deref for ScratchBuf<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        self.buf.as_ref().unwrap()
    }
}

impl DerefMut for ScratchBuf<'_> {
    fn deref_mut(&mut self) -> &mut String {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for ScratchBuf<'_> {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            self.pool.buffers.lock().unwrap().push(buf);
        }
    }
}

/// The physical projection roots active for `mount_type`, in the fixed order
/// operations are replayed.
pub fn projection_prefixes(mount_type: MountType) -> Vec<&'static str> {
    let mut prefixes = Vec::with_capacity(4);
    if !matches!(mount_type, MountType::None | MountType::Default) {
        prefixes.push("/mnt/runtime/default");
    }
    if !matches!(mount_type, MountType::None | MountType::Read) {
        prefixes.push("/mnt/runtime/read");
    }
    if !matches!(mount_type, MountType::None | MountType::Write) {
        prefixes.push("/mnt/runtime/write");
    }
    if mount_type != MountType::None {
        prefixes.push("/storage");
    }
    prefixes
}

fn synthesize(buf: &mut String, prefix: &str, label: &str, rel: &str) {
    let rel = rel.strip_prefix('/').unwrap_or(rel);
    buf.clear();
    let _ = write!(buf, "{prefix}/{label}/{rel}");
}

/// Snapshot of the propagation-relevant options, taken once under the read
/// lock so a concurrent remount cannot tear the label.
fn propagation_target(mount: &Mount) -> FsResult<Option<(MountType, String)>> {
    let opts = mount.options();
    if opts.mount_type == MountType::None {
        return Ok(None);
    }
    match opts.label.as_deref() {
        Some(label) if !label.is_empty() => Ok(Some((opts.mount_type, label.to_owned()))),
        _ => {
            tracing::warn!("propagation requested on a mount without a label");
            Err(FsError::InvalidArgument)
        }
    }
}

/// Replay a completed unlink of `pathname` (mount-relative) on every active
/// projection, under a substituted root identity.
pub fn propagate_unlink(mount: &Mount, pathname: &str) -> FsResult<()> {
    let Some((mount_type, label)) = propagation_target(mount)? else {
        return Ok(());
    };

    let cred = ScopedCredentials::acquire(mount.creds().as_ref(), 0, 0)?;
    let mut path = mount.scratch().acquire()?;

    let mut ret = Ok(());
    for prefix in projection_prefixes(mount_type) {
        synthesize(&mut path, prefix, &label, pathname);
        let attempt = mount.path_ops().unlink_at(cred.token(), Path::new(path.as_str()));
        if let Err(err) = &attempt {
            tracing::debug!(path = path.as_str(), error = %err, "projection unlink failed");
        }
        ret = attempt;
    }
    ret
}

/// Replay a completed rename on every active projection. Uses the
/// non-propagating rename primitive so a projection's own hooks cannot
/// re-trigger the fan-out.
pub fn propagate_rename(mount: &Mount, oldname: &str, newname: &str) -> FsResult<()> {
    let Some((mount_type, label)) = propagation_target(mount)? else {
        return Ok(());
    };

    let cred = ScopedCredentials::acquire(mount.creds().as_ref(), 0, 0)?;
    let mut old_path = mount.scratch().acquire()?;
    let mut new_path = mount.scratch().acquire()?;

    let mut ret = Ok(());
    for prefix in projection_prefixes(mount_type) {
        synthesize(&mut old_path, prefix, &label, oldname);
        synthesize(&mut new_path, prefix, &label, newname);
        let attempt = mount.path_ops().rename_at(
            cred.token(),
            Path::new(old_path.as_str()),
            Path::new(new_path.as_str()),
            RENAME_NOPROPAGATE,
        );
        if let Err(err) = &attempt {
            tracing::debug!(
                old = old_path.as_str(),
                new = new_path.as_str(),
                error = %err,
                "projection rename failed"
            );
        }
        ret = attempt;
    }
    ret
}
