// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! End-to-end driver tests against the built binary.

use model_ir::{
    BatchNorm, Blob, Convolution, Graph, Input, Layer, LayerKind, ReLU, FP16_MAGIC,
};
use std::path::{Path, PathBuf};
use std::process::Command;
use tensor_core::{DType, Tensor};

fn nnopt() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nnopt"))
}

/// Input → Conv(2 outputs, no bias) → BN → ReLU, fully fusable.
fn write_sample_model(dir: &Path) -> (PathBuf, PathBuf) {
    let conv = Convolution {
        num_output: 2,
        kernel_w: 1,
        kernel_h: 1,
        bias_term: 0,
        weight_data_size: 4,
        weight_data: Tensor::from_values(vec![1.0, 2.0, 3.0, 4.0]),
        ..Convolution::default()
    };
    let bn = BatchNorm {
        channels: 2,
        eps: 1e-5,
        slope_data: Tensor::from_values(vec![1.0, 2.0]),
        mean_data: Tensor::from_values(vec![0.0, 0.0]),
        var_data: Tensor::from_values(vec![1.0, 1.0]),
        bias_data: Tensor::from_values(vec![0.5, 0.25]),
    };
    let mk = |name: &str, bottoms: Vec<usize>, tops: Vec<usize>, kind: LayerKind| Layer {
        name: name.into(),
        bottoms,
        tops,
        kind,
    };
    let graph = Graph {
        layers: vec![
            mk("data", vec![], vec![0], LayerKind::Input(Input { w: 4, h: 4, c: 2 })),
            mk("conv1", vec![0], vec![1], LayerKind::Convolution(conv)),
            mk("bn1", vec![1], vec![2], LayerKind::BatchNorm(bn)),
            mk("relu1", vec![2], vec![3], LayerKind::ReLU(ReLU { slope: 0.0 })),
        ],
        blobs: ["data", "conv1", "bn1", "relu1"]
            .iter()
            .enumerate()
            .map(|(i, name)| Blob {
                name: (*name).to_string(),
                producer: i,
            })
            .collect(),
    };

    let param = dir.join("model.param");
    let bin = dir.join("model.bin");
    graph.save_files(&param, &bin, DType::F32).unwrap();
    (param, bin)
}

#[test]
fn test_optimizes_model_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (in_param, in_bin) = write_sample_model(dir.path());
    let out_param = dir.path().join("opt.param");
    let out_bin = dir.path().join("opt.bin");

    let status = nnopt()
        .args([&in_param, &in_bin, &out_param, &out_bin])
        .arg("0")
        .status()
        .unwrap();
    assert!(status.success());

    let optimized = Graph::load_files(&out_param, &out_bin).unwrap();
    optimized.validate().unwrap();
    // BN and ReLU are gone from the output entirely.
    assert_eq!(optimized.layers.len(), 2);
    match &optimized.layers[1].kind {
        LayerKind::Convolution(op) => {
            assert_eq!(op.bias_term, 1);
            assert_eq!(op.activation_type, 1);
            assert_eq!(op.bias_data.as_slice(), &[0.5, 0.25]);
        }
        other => panic!("expected Convolution, got {}", other.type_name()),
    }
}

#[test]
fn test_fp16_flag_changes_tagged_storage() {
    let dir = tempfile::tempdir().unwrap();
    let (in_param, in_bin) = write_sample_model(dir.path());
    let out_param = dir.path().join("opt.param");
    let out_bin = dir.path().join("opt.bin");

    let status = nnopt()
        .args([&in_param, &in_bin, &out_param, &out_bin])
        .arg("65536")
        .status()
        .unwrap();
    assert!(status.success());

    // The first record in the output is the convolution's tagged weight.
    let bytes = std::fs::read(&out_bin).unwrap();
    assert_eq!(&bytes[0..4], &FP16_MAGIC.to_le_bytes());

    // The fp16 model still loads, with the weights widened back.
    let optimized = Graph::load_files(&out_param, &out_bin).unwrap();
    match &optimized.layers[1].kind {
        LayerKind::Convolution(op) => assert_eq!(op.weight_data.total(), 4),
        other => panic!("expected Convolution, got {}", other.type_name()),
    }
}

#[test]
fn test_wrong_arity_exits_with_minus_one() {
    let status = nnopt().status().unwrap();
    // exit(-1) surfaces as 255.
    assert_eq!(status.code(), Some(255));
}

#[test]
fn test_load_failure_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let status = nnopt()
        .args([
            dir.path().join("missing.param"),
            dir.path().join("missing.bin"),
            dir.path().join("o.param"),
            dir.path().join("o.bin"),
        ])
        .arg("0")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_extended_form_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let (in_param, in_bin) = write_sample_model(dir.path());
    let out_param = dir.path().join("opt.param");
    let out_bin = dir.path().join("opt.bin");

    // With no execution engine the probe arguments are accepted and the
    // search is skipped.
    let status = nnopt()
        .args([&in_param, &in_bin, &out_param, &out_bin])
        .args(["0", "data", "4", "4", "2"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(out_param.exists());
}
