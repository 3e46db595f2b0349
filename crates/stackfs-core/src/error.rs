// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for StackFS Core

use std::io;

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Map to an OS error code for embedding hosts.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::OutOfMemory => libc::ENOMEM,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::NotFound => libc::ENOENT,
            FsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
