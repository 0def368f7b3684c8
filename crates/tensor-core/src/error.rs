// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction.

/// Errors that can occur when building or reshaping tensors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer does not match the shape's element count.
    #[error("buffer holds {actual} elements, shape expects {expected}")]
    ElementCountMismatch { expected: usize, actual: usize },
}
