// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pointwise nonlinearities.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use crate::weights::{WeightReader, WeightWriter};
use crate::ModelError;
use std::io::{self, Read, Write};
use tensor_core::Tensor;

#[derive(Debug, Clone, Default)]
pub struct ReLU {
    /// Zero for plain ReLU; a nonzero slope makes it leaky.
    pub slope: f32,
}

impl LayerSchema for ReLU {
    fn load_param(&mut self, pd: &ParamDict) {
        self.slope = pd.get_float(0, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_float(0, self.slope, Self::default().slope)
    }
}

#[derive(Debug, Clone)]
pub struct Clip {
    pub min: f32,
    pub max: f32,
}

impl Default for Clip {
    fn default() -> Self {
        Self {
            min: -f32::MAX,
            max: f32::MAX,
        }
    }
}

impl LayerSchema for Clip {
    fn load_param(&mut self, pd: &ParamDict) {
        self.min = pd.get_float(0, -f32::MAX);
        self.max = pd.get_float(1, f32::MAX);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_float(0, self.min, def.min)?;
        pw.push_float(1, self.max, def.max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sigmoid;

impl LayerSchema for Sigmoid {}

#[derive(Debug, Clone)]
pub struct ELU {
    pub alpha: f32,
}

impl Default for ELU {
    fn default() -> Self {
        Self { alpha: 0.1 }
    }
}

impl LayerSchema for ELU {
    fn load_param(&mut self, pd: &ParamDict) {
        self.alpha = pd.get_float(0, 0.1);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_float(0, self.alpha, Self::default().alpha)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PReLU {
    pub num_slope: i32,
    pub slope_data: Tensor,
}

impl LayerSchema for PReLU {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_slope = pd.get_int(0, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        self.slope_data = mb.read_raw(self.num_slope as usize)?;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.num_slope, Self::default().num_slope)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.slope_data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Threshold {
    pub threshold: f32,
}

impl LayerSchema for Threshold {
    fn load_param(&mut self, pd: &ParamDict) {
        self.threshold = pd.get_float(0, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_float(0, self.threshold, Self::default().threshold)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Softmax {
    pub axis: i32,
}

impl LayerSchema for Softmax {
    fn load_param(&mut self, pd: &ParamDict) {
        self.axis = pd.get_int(0, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.axis, Self::default().axis)?;
        // Compatibility marker consumed by old runtimes: any non-default
        // axis must be accompanied by `1=1`.
        if self.axis != 0 {
            pw.push_int(1, 1, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_params(op: &impl LayerSchema) -> String {
        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_relu_default_is_silent() {
        assert_eq!(saved_params(&ReLU::default()), "");
        assert_eq!(saved_params(&ReLU { slope: 0.1 }), " 0=0.100000");
    }

    #[test]
    fn test_clip_bounds() {
        let mut pd = ParamDict::new();
        pd.parse_token("0=-1.000000", 1).unwrap();
        pd.parse_token("1=6.000000", 1).unwrap();
        let mut op = Clip::default();
        op.load_param(&pd);
        assert_eq!(op.min, -1.0);
        assert_eq!(op.max, 6.0);
        assert_eq!(saved_params(&op), " 0=-1.000000 1=6.000000");
    }

    #[test]
    fn test_softmax_companion_key() {
        assert_eq!(saved_params(&Softmax { axis: 0 }), "");
        assert_eq!(saved_params(&Softmax { axis: 1 }), " 0=1 1=1");
        assert_eq!(saved_params(&Softmax { axis: 2 }), " 0=2 1=1");
    }

    #[test]
    fn test_prelu_weights() {
        let mut bytes = Vec::new();
        WeightWriter::new(&mut bytes, tensor_core::DType::F32)
            .write_raw(&Tensor::from_values(vec![0.1, 0.2, 0.3]))
            .unwrap();
        let mut op = PReLU {
            num_slope: 3,
            ..PReLU::default()
        };
        op.load_model(&mut WeightReader::new(bytes.as_slice())).unwrap();
        assert_eq!(op.slope_data.as_slice(), &[0.1, 0.2, 0.3]);
    }
}
