// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The layer kind sum type and per-kind schemas.
//!
//! Every supported kind is a plain struct carrying its parameters and weight
//! tensors, grouped into family modules. [`LayerKind`] is the tagged variant
//! over all of them; passes match on the tag, the codecs dispatch through
//! it. Each kind's `Default` is the parameter state after loading an empty
//! dictionary — the serialiser compares against a fresh default to decide
//! which keys to emit.
//!
//! Kind indices are assigned in declaration order and are stable: they are
//! the `create`-by-index handle external tooling uses, and they never appear
//! in the file format itself (topology lines carry kind names).

mod activation;
mod convolution;
mod detection;
mod elementwise;
mod layout;
mod norm;
mod pooling;

pub use activation::{Clip, Sigmoid, Softmax, Threshold, ELU, PReLU, ReLU};
pub use convolution::{
    AffineMut, Convolution, ConvolutionDepthWise, Deconvolution, DeconvolutionDepthWise,
    InnerProduct,
};
pub use detection::{
    DetectionOutput, PriorBox, Proposal, YoloDetectionOutput, Yolov3DetectionOutput,
};
pub use elementwise::{
    BinaryOp, Dropout, Eltwise, Exp, Log, Power, Quantize, Requantize, UnaryOp,
};
pub use layout::{
    Concat, Crop, Flatten, Input, Interp, Padding, Permute, Reorg, Reshape, ShuffleChannel,
    Slice, Split,
};
pub use norm::{BatchNorm, Bias, InstanceNorm, Normalize, Scale, LRN, MVN};
pub use pooling::{PSROIPooling, Pooling, ROIAlign, ROIPooling, Reduction};

use crate::param::{ParamDict, ParamWriter};
use crate::weights::{WeightReader, WeightWriter};
use crate::ModelError;
use std::io::{self, Read, Write};

/// Per-kind load/save behavior.
///
/// The four methods mirror the codec split: parameters live in the text
/// topology, weights in the binary stream. Kinds without weights or without
/// parameters take the default no-op.
pub(crate) trait LayerSchema {
    fn load_param(&mut self, pd: &ParamDict) {
        let _ = pd;
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        let _ = mb;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let _ = pw;
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        let _ = wb;
        Ok(())
    }
}

macro_rules! declare_layer_kinds {
    ($(($index:literal, $variant:ident)),* $(,)?) => {
        /// A layer's kind tag plus its kind-specific body.
        ///
        /// `Fused` is the sentinel for a layer absorbed into a predecessor:
        /// inert for every pass and skipped by serialisation.
        #[derive(Debug, Clone)]
        pub enum LayerKind {
            $( $variant($variant), )*
            Fused,
        }

        impl LayerKind {
            /// Creates a default-parameter kind from its topology name.
            pub fn from_type_name(name: &str) -> Option<Self> {
                $(
                    if name == stringify!($variant) {
                        return Some(Self::$variant(<$variant>::default()));
                    }
                )*
                None
            }

            /// Creates a default-parameter kind from its stable index.
            pub fn from_kind_index(index: i32) -> Option<Self> {
                $(
                    if index == $index {
                        return Some(Self::$variant(<$variant>::default()));
                    }
                )*
                None
            }

            /// The kind name as written in topology files.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => stringify!($variant), )*
                    Self::Fused => "Fused",
                }
            }

            /// The stable numeric index of this kind; `Fused` has none.
            pub fn kind_index(&self) -> i32 {
                match self {
                    $( Self::$variant(_) => $index, )*
                    Self::Fused => -1,
                }
            }

            pub fn is_fused(&self) -> bool {
                matches!(self, Self::Fused)
            }

            /// Populates parameters from a dictionary, defaulting absent keys.
            pub fn load_param(&mut self, pd: &ParamDict) {
                match self {
                    $( Self::$variant(op) => op.load_param(pd), )*
                    Self::Fused => {}
                }
            }

            /// Consumes this kind's weight records in declared order.
            pub fn load_model<R: Read>(
                &mut self,
                mb: &mut WeightReader<R>,
            ) -> Result<(), ModelError> {
                match self {
                    $( Self::$variant(op) => op.load_model(mb), )*
                    Self::Fused => Ok(()),
                }
            }

            /// Emits this kind's non-default parameters.
            pub fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
                match self {
                    $( Self::$variant(op) => op.save_param(pw), )*
                    Self::Fused => Ok(()),
                }
            }

            /// Emits this kind's weight records in declared order.
            pub fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
                match self {
                    $( Self::$variant(op) => op.save_model(wb), )*
                    Self::Fused => Ok(()),
                }
            }
        }
    };
}

declare_layer_kinds![
    (0, BatchNorm),
    (1, Bias),
    (2, BinaryOp),
    (3, Clip),
    (4, Concat),
    (5, Convolution),
    (6, ConvolutionDepthWise),
    (7, Crop),
    (8, Deconvolution),
    (9, DeconvolutionDepthWise),
    (10, DetectionOutput),
    (11, Dropout),
    (12, Eltwise),
    (13, ELU),
    (14, Exp),
    (15, Flatten),
    (16, InnerProduct),
    (17, Input),
    (18, InstanceNorm),
    (19, Interp),
    (20, Log),
    (21, LRN),
    (22, MVN),
    (23, Normalize),
    (24, Padding),
    (25, Permute),
    (26, Pooling),
    (27, Power),
    (28, PReLU),
    (29, PriorBox),
    (30, Proposal),
    (31, PSROIPooling),
    (32, Quantize),
    (33, Reduction),
    (34, ReLU),
    (35, Reorg),
    (36, Requantize),
    (37, Reshape),
    (38, ROIAlign),
    (39, ROIPooling),
    (40, Scale),
    (41, ShuffleChannel),
    (42, Sigmoid),
    (43, Slice),
    (44, Softmax),
    (45, Split),
    (46, Threshold),
    (47, UnaryOp),
    (48, YoloDetectionOutput),
    (49, Yolov3DetectionOutput),
];

impl LayerKind {
    /// Borrowed view over the affine kinds (`Convolution*`, `Deconvolution*`,
    /// `InnerProduct`) that arithmetic fusions mutate through: the
    /// per-output-channel weight/bias pair and the trailing activation slot.
    pub fn affine_mut(&mut self) -> Option<AffineMut<'_>> {
        match self {
            Self::Convolution(op) => Some(AffineMut {
                num_output: op.num_output,
                weight_data_size: op.weight_data_size,
                bias_term: &mut op.bias_term,
                weight_data: &mut op.weight_data,
                bias_data: &mut op.bias_data,
                activation_type: &mut op.activation_type,
                activation_params: &mut op.activation_params,
            }),
            Self::ConvolutionDepthWise(op) => Some(AffineMut {
                num_output: op.num_output,
                weight_data_size: op.weight_data_size,
                bias_term: &mut op.bias_term,
                weight_data: &mut op.weight_data,
                bias_data: &mut op.bias_data,
                activation_type: &mut op.activation_type,
                activation_params: &mut op.activation_params,
            }),
            Self::Deconvolution(op) => Some(AffineMut {
                num_output: op.num_output,
                weight_data_size: op.weight_data_size,
                bias_term: &mut op.bias_term,
                weight_data: &mut op.weight_data,
                bias_data: &mut op.bias_data,
                activation_type: &mut op.activation_type,
                activation_params: &mut op.activation_params,
            }),
            Self::DeconvolutionDepthWise(op) => Some(AffineMut {
                num_output: op.num_output,
                weight_data_size: op.weight_data_size,
                bias_term: &mut op.bias_term,
                weight_data: &mut op.weight_data,
                bias_data: &mut op.bias_data,
                activation_type: &mut op.activation_type,
                activation_params: &mut op.activation_params,
            }),
            Self::InnerProduct(op) => Some(AffineMut {
                num_output: op.num_output,
                weight_data_size: op.weight_data_size,
                bias_term: &mut op.bias_term,
                weight_data: &mut op.weight_data,
                bias_data: &mut op.bias_data,
                activation_type: &mut op.activation_type,
                activation_params: &mut op.activation_params,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for name in [
            "BatchNorm",
            "Convolution",
            "ConvolutionDepthWise",
            "InnerProduct",
            "PReLU",
            "Sigmoid",
            "Split",
            "Yolov3DetectionOutput",
        ] {
            let kind = LayerKind::from_type_name(name).unwrap();
            assert_eq!(kind.type_name(), name);
        }
        assert!(LayerKind::from_type_name("NoSuchKind").is_none());
    }

    #[test]
    fn test_kind_index_roundtrip() {
        for index in 0..50 {
            let kind = LayerKind::from_kind_index(index).unwrap();
            assert_eq!(kind.kind_index(), index);
        }
        assert!(LayerKind::from_kind_index(50).is_none());
        assert!(LayerKind::from_kind_index(-1).is_none());
    }

    #[test]
    fn test_fused_is_inert() {
        let mut kind = LayerKind::Fused;
        assert!(kind.is_fused());
        assert_eq!(kind.kind_index(), -1);
        kind.load_param(&ParamDict::new());
        let mut out = Vec::new();
        kind.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_affine_view_covers_exactly_the_affine_kinds() {
        for name in [
            "Convolution",
            "ConvolutionDepthWise",
            "Deconvolution",
            "DeconvolutionDepthWise",
            "InnerProduct",
        ] {
            let mut kind = LayerKind::from_type_name(name).unwrap();
            assert!(kind.affine_mut().is_some(), "{name}");
        }
        let mut bn = LayerKind::from_type_name("BatchNorm").unwrap();
        assert!(bn.affine_mut().is_none());
    }
}
