// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model serialisation: [`Graph`] back to topology text and weight stream.
//!
//! Fused layers are skipped entirely — they contribute no line, no weight
//! records, and no blob names. The header counts are therefore recomputed
//! from the surviving layers, not taken from the input. Kind and layer
//! names print left-aligned in 24-character columns; parameters follow the
//! sparse-emission rules in [`crate::param`].

use crate::param::ParamWriter;
use crate::weights::WeightWriter;
use crate::{Graph, ModelError};
use crate::loader::PARAM_MAGIC;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tensor_core::DType;

impl Graph {
    /// Writes the model to its topology and weights files.
    ///
    /// `storage` selects how tagged weight records are stored; untagged
    /// records are always raw fp32.
    pub fn save_files(
        &self,
        param_path: &Path,
        bin_path: &Path,
        storage: DType,
    ) -> Result<(), ModelError> {
        let mut param = BufWriter::new(File::create(param_path)?);
        let mut bin = BufWriter::new(File::create(bin_path)?);
        self.write_to(&mut param, &mut bin, storage)?;
        param.flush()?;
        bin.flush()?;
        tracing::debug!(
            layers = self.live_layer_count(),
            storage = storage.as_str(),
            "saved model to {}",
            param_path.display(),
        );
        Ok(())
    }

    /// Writes the model to a pair of streams.
    pub fn write_to(
        &self,
        mut param: impl Write,
        bin: impl Write,
        storage: DType,
    ) -> Result<(), ModelError> {
        writeln!(param, "{PARAM_MAGIC}")?;

        // Post-fusion counts: live layers, and the distinct blob names they
        // still reference.
        let mut live_blob_names: HashSet<&str> = HashSet::new();
        for layer in self.layers.iter().filter(|l| !l.is_fused()) {
            for &b in layer.bottoms.iter().chain(layer.tops.iter()) {
                live_blob_names.insert(self.blobs[b].name.as_str());
            }
        }
        writeln!(
            param,
            "{} {}",
            self.live_layer_count(),
            live_blob_names.len()
        )?;

        let mut weights = WeightWriter::new(bin, storage);
        for layer in self.layers.iter().filter(|l| !l.is_fused()) {
            write!(
                param,
                "{:<24} {:<24} {} {}",
                layer.type_name(),
                layer.name,
                layer.bottoms.len(),
                layer.tops.len(),
            )?;
            for &b in &layer.bottoms {
                write!(param, " {}", self.blobs[b].name)?;
            }
            for &t in &layer.tops {
                write!(param, " {}", self.blobs[t].name)?;
            }

            let mut pw = ParamWriter::new(&mut param);
            layer.kind.save_param(&mut pw)?;
            writeln!(param)?;

            layer.kind.save_model(&mut weights)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Blob, Layer, LayerKind};

    fn saved_param_text(graph: &Graph) -> String {
        let mut param = Vec::new();
        let mut bin = Vec::new();
        graph.write_to(&mut param, &mut bin, DType::F32).unwrap();
        String::from_utf8(param).unwrap()
    }

    fn relu_graph() -> Graph {
        let mut relu = LayerKind::from_type_name("ReLU").unwrap();
        if let LayerKind::ReLU(op) = &mut relu {
            op.slope = 0.1;
        }
        Graph {
            layers: vec![
                Layer {
                    name: "data".into(),
                    bottoms: vec![],
                    tops: vec![0],
                    kind: LayerKind::from_type_name("Input").unwrap(),
                },
                Layer {
                    name: "act".into(),
                    bottoms: vec![0],
                    tops: vec![1],
                    kind: relu,
                },
            ],
            blobs: vec![
                Blob {
                    name: "data".into(),
                    producer: 0,
                },
                Blob {
                    name: "act_out".into(),
                    producer: 1,
                },
            ],
        }
    }

    #[test]
    fn test_column_layout_and_params() {
        let text = saved_param_text(&relu_graph());
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("7767517"));
        assert_eq!(lines.next(), Some("2 2"));
        assert_eq!(
            lines.next(),
            Some("Input                    data                     0 1 data")
        );
        assert_eq!(
            lines.next(),
            Some("ReLU                     act                      1 1 data act_out 0=0.100000")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_fused_layers_are_skipped_and_counts_shrink() {
        let mut g = relu_graph();
        // Fuse the ReLU away as the pipeline would: the Input takes over
        // its top.
        g.layers[1].kind = LayerKind::Fused;
        g.layers[0].tops = vec![1];
        g.blobs[1].producer = 0;

        let text = saved_param_text(&g);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("7767517"));
        assert_eq!(lines.next(), Some("1 1"));
        assert_eq!(
            lines.next(),
            Some("Input                    data                     0 1 act_out")
        );
        assert_eq!(lines.next(), None);
    }
}
