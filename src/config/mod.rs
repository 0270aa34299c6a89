// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Configuration module for Brook
//!
//! Handles loading and validating service settings from the environment.

pub mod settings;

pub use settings::*;
