// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only utilities and mock implementations for StackFS Core
//!
//! This module provides recording mock implementations of the collaborator
//! traits so lifecycle and propagation behavior can be asserted without a
//! real host filesystem underneath.

#[cfg(test)]
pub mod mocks;
