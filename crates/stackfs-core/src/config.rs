// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-mount option block for StackFS

use serde::{Deserialize, Serialize};

use crate::types::MountType;

/// Options carried by a mounted instance. The host's option parser fills this
/// in; the core only reads it (remount never mutates it).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    /// Low-level uid the backing objects are remapped to.
    #[serde(default)]
    pub fs_low_uid: u32,
    /// Low-level gid the backing objects are remapped to.
    #[serde(default)]
    pub fs_low_gid: u32,
    /// Secondary gid applied to the stacked view.
    #[serde(default)]
    pub sdfs_gid: u32,
    /// Permission mask applied to the stacked view.
    #[serde(default)]
    pub sdfs_mask: u32,
    #[serde(default)]
    pub multi_user: bool,
    /// Backing free space hidden from statistics reporting, in MB.
    #[serde(default)]
    pub reserved_mb: u32,
    /// Label segment of the projection paths. `None` disables propagation for
    /// any type other than [`MountType::None`] (rejected, not silently built).
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub mount_type: MountType,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            fs_low_uid: 0,
            fs_low_gid: 0,
            sdfs_gid: 0,
            sdfs_mask: 0,
            multi_user: false,
            reserved_mb: 0,
            label: None,
            mount_type: MountType::None,
        }
    }
}

impl MountOptions {
    /// Options for a labelled view of the given type, with everything else at
    /// defaults. Mostly a test and embedding convenience.
    pub fn labelled(label: impl Into<String>, mount_type: MountType) -> Self {
        Self {
            label: Some(label.into()),
            mount_type,
            ..Self::default()
        }
    }
}
