// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for model loading, validation, and serialisation.

/// Errors that can occur when working with the model representation.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An underlying read or write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The topology file does not start with the expected magic number.
    #[error("bad topology magic '{found}', expected 7767517")]
    BadMagic { found: String },

    /// A topology line could not be parsed.
    #[error("malformed topology line {line}: {detail}")]
    Parse { line: usize, detail: String },

    /// A layer line names a kind this tool does not know.
    #[error("unknown layer kind '{name}' on line {line}")]
    UnknownLayerKind { name: String, line: usize },

    /// A layer consumes a blob that no earlier layer produced.
    #[error("layer '{layer}' consumes blob '{blob}' which no earlier layer produces")]
    UnknownBlob { layer: String, blob: String },

    /// Two layers claim to produce the same blob.
    #[error("blob '{blob}' already has a producer; second producer is layer '{layer}'")]
    DuplicateBlob { layer: String, blob: String },

    /// The weights file ended before a record was complete.
    #[error("weights file truncated: wanted {wanted} bytes at offset {offset}")]
    TruncatedWeights { wanted: usize, offset: u64 },

    /// A tagged weight record carries a storage tag this tool does not know.
    #[error("unrecognised weight tag {tag:#010x} at offset {offset}")]
    UnknownWeightTag { tag: u32, offset: u64 },

    /// The model carries int8 quantisation scales, which are out of scope.
    #[error("int8 quantised models are not supported (nonzero int8_scale_term)")]
    Int8NotSupported,

    /// A structural invariant does not hold.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}
