// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # nnopt
//!
//! Command-line driver for the graph optimizer: load a model, run the
//! fixed rewrite pipeline, write the leaner model back.
//!
//! ## Usage
//! ```bash
//! # fp32 output
//! nnopt model.param model.bin model-opt.param model-opt.bin 0
//!
//! # fp16 storage for tagged weights
//! nnopt model.param model.bin model-opt.param model-opt.bin 65536
//!
//! # with fastest-convolution probing (requires an execution engine)
//! nnopt model.param model.bin model-opt.param model-opt.bin 0 data 227 227 3
//! ```

use anyhow::Context;
use clap::Parser;
use model_ir::Graph;
use std::path::PathBuf;
use tensor_core::DType;

/// Storage flag value selecting fp16 for tagged weights.
const FP16_STORAGE_FLAG: i32 = 65536;

#[derive(Parser)]
#[command(
    name = "nnopt",
    about = "Offline optimizer for inference graphs: fuses, eliminates, and \
             substitutes layers without changing model outputs",
    version
)]
struct Cli {
    /// Input topology file.
    inparam: PathBuf,

    /// Input weights file.
    inbin: PathBuf,

    /// Output topology file.
    outparam: PathBuf,

    /// Output weights file.
    outbin: PathBuf,

    /// Storage flag: 65536 stores tagged weights as fp16, anything else
    /// keeps fp32.
    flag: i32,

    /// Input blob to feed when probing for the fastest convolution
    /// implementation.
    #[arg(requires = "w")]
    dataname: Option<String>,

    /// Probe input width.
    #[arg(requires = "h")]
    w: Option<i32>,

    /// Probe input height.
    #[arg(requires = "c")]
    h: Option<i32>,

    /// Probe input channels.
    c: Option<i32>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(-1);
        }
    };

    init_tracing();

    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut graph = Graph::load_files(&cli.inparam, &cli.inbin).with_context(|| {
        format!(
            "failed to load model from '{}' and '{}'",
            cli.inparam.display(),
            cli.inbin.display(),
        )
    })?;

    if let Some(dataname) = &cli.dataname {
        // Selecting impl_type requires timing real forward passes, which
        // needs an execution engine linked into the build; this one carries
        // none, so the search is skipped and impl_type stays untouched.
        tracing::warn!(
            "no execution engine available, skipping fastest-conv search for input '{dataname}'"
        );
    }

    let report = graph_rewrite::optimize(&mut graph)?;
    tracing::info!(
        "applied {} rewrites: {} fused, {} eliminated, {} replaced",
        report.total(),
        report.fused,
        report.eliminated,
        report.replaced,
    );

    let storage = if cli.flag == FP16_STORAGE_FLAG {
        DType::F16
    } else {
        DType::F32
    };
    graph
        .save_files(&cli.outparam, &cli.outbin, storage)
        .with_context(|| {
            format!(
                "failed to save model to '{}' and '{}'",
                cli.outparam.display(),
                cli.outbin.display(),
            )
        })?;

    Ok(())
}
