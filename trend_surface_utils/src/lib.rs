/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports numeric helpers and constants shared across the trend_surface crates.
//
// Created on: 19 Oct 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities for the [`trend_surface`] crate
//!
//! Small slice-level helpers (medians, moments, extents) and the
//! numeric constants used by the regression engine.
mod utils;

pub mod constants;

pub use utils::{dot, get_xy_extents, l2_norm, mean, median, std_dev, weighted_mean};
