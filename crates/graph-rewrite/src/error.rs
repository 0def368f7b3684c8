// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the rewrite engine.
//!
//! Pattern mismatches are not errors — a pass that finds nothing to do is a
//! no-op. Errors are reserved for semantic mismatches: weight folding that
//! would silently corrupt the model if carried out.

/// Fatal semantic mismatches encountered while folding weights.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// A batchnorm's channel count must divide its predecessor's weight
    /// element count to define the per-channel slices.
    #[error(
        "layer '{layer}': {channels} channels do not divide weight size {weight_data_size}"
    )]
    ChannelMismatch {
        layer: String,
        channels: i32,
        weight_data_size: i32,
    },

    /// A per-channel tensor does not have one value per channel.
    #[error("layer '{layer}': expected {expected} per-channel values, found {found}")]
    LengthMismatch {
        layer: String,
        expected: usize,
        found: usize,
    },
}
