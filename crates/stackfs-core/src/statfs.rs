// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Capacity reservation filter
//!
//! Free-space reporting for a stacked mount: the backing filesystem's numbers,
//! minus the administrator-configured reservation. Free and available are
//! unified after the clamp so space-consuming tools never see the reserved
//! region.

use crate::error::{FsError, FsResult};
use crate::mount::Mount;
use crate::types::{StatVfs, STACKFS_SUPER_MAGIC};

/// Query the backing filesystem and apply the mount's reservation. The type
/// tag is always rewritten to the overlay's own magic value so user-level
/// utilities do not mistake the mount for the backing filesystem.
pub fn adjusted_statfs(mount: &Mount) -> FsResult<StatVfs> {
    let mut stat = mount.backing().statfs()?;
    let reserved_mb = mount.options().reserved_mb;

    if reserved_mb != 0 {
        if stat.bsize == 0 {
            tracing::error!("backing filesystem returned a zero block size");
            return Err(FsError::InvalidArgument);
        }

        let reserved_blocks = (reserved_mb as u64 * 1024 * 1024) / stat.bsize;
        // Total is deliberately unclamped; if the backing filesystem
        // under-reports, its own semantics win.
        stat.blocks = stat.blocks.wrapping_sub(reserved_blocks);

        if stat.bavail > reserved_blocks {
            stat.bavail -= reserved_blocks;
        } else {
            stat.bavail = 0;
        }

        // Make reserved blocks invisible to space consumers.
        stat.bfree = stat.bavail;
    }

    stat.fs_type = STACKFS_SUPER_MAGIC;
    Ok(stat)
}
