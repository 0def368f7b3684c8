// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise arithmetic kinds.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use crate::weights::{WeightReader, WeightWriter};
use crate::ModelError;
use std::io::{self, Read, Write};
use tensor_core::Tensor;

#[derive(Debug, Clone, Default)]
pub struct BinaryOp {
    pub op_type: i32,
    pub with_scalar: i32,
    pub b: f32,
}

impl LayerSchema for BinaryOp {
    fn load_param(&mut self, pd: &ParamDict) {
        self.op_type = pd.get_int(0, 0);
        self.with_scalar = pd.get_int(1, 0);
        self.b = pd.get_float(2, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.op_type, def.op_type)?;
        pw.push_int(1, self.with_scalar, def.with_scalar)?;
        pw.push_float(2, self.b, def.b)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnaryOp {
    pub op_type: i32,
}

impl LayerSchema for UnaryOp {
    fn load_param(&mut self, pd: &ParamDict) {
        self.op_type = pd.get_int(0, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.op_type, Self::default().op_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Eltwise {
    pub op_type: i32,
    pub coeffs: Vec<f32>,
}

impl LayerSchema for Eltwise {
    fn load_param(&mut self, pd: &ParamDict) {
        self.op_type = pd.get_int(0, 0);
        self.coeffs = pd.get_float_array(1);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.op_type, Self::default().op_type)?;
        if !self.coeffs.is_empty() {
            pw.push_float_array(1, &self.coeffs)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Exp {
    pub base: f32,
    pub scale: f32,
    pub shift: f32,
}

impl Default for Exp {
    fn default() -> Self {
        Self {
            base: -1.0,
            scale: 1.0,
            shift: 0.0,
        }
    }
}

impl LayerSchema for Exp {
    fn load_param(&mut self, pd: &ParamDict) {
        self.base = pd.get_float(0, -1.0);
        self.scale = pd.get_float(1, 1.0);
        self.shift = pd.get_float(2, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_float(0, self.base, def.base)?;
        pw.push_float(1, self.scale, def.scale)?;
        pw.push_float(2, self.shift, def.shift)
    }
}

#[derive(Debug, Clone)]
pub struct Log {
    pub base: f32,
    pub scale: f32,
    pub shift: f32,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            base: -1.0,
            scale: 1.0,
            shift: 0.0,
        }
    }
}

impl LayerSchema for Log {
    fn load_param(&mut self, pd: &ParamDict) {
        self.base = pd.get_float(0, -1.0);
        self.scale = pd.get_float(1, 1.0);
        self.shift = pd.get_float(2, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_float(0, self.base, def.base)?;
        pw.push_float(1, self.scale, def.scale)?;
        pw.push_float(2, self.shift, def.shift)
    }
}

#[derive(Debug, Clone)]
pub struct Power {
    pub power: f32,
    pub scale: f32,
    pub shift: f32,
}

impl Default for Power {
    fn default() -> Self {
        Self {
            power: 1.0,
            scale: 1.0,
            shift: 0.0,
        }
    }
}

impl LayerSchema for Power {
    fn load_param(&mut self, pd: &ParamDict) {
        self.power = pd.get_float(0, 1.0);
        self.scale = pd.get_float(1, 1.0);
        self.shift = pd.get_float(2, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_float(0, self.power, def.power)?;
        pw.push_float(1, self.scale, def.scale)?;
        pw.push_float(2, self.shift, def.shift)
    }
}

/// Inference-time dropout is the identity scaled by `scale`; a scale of one
/// makes the whole layer removable, which the elimination pass exploits.
#[derive(Debug, Clone)]
pub struct Dropout {
    pub scale: f32,
}

impl Default for Dropout {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl LayerSchema for Dropout {
    fn load_param(&mut self, pd: &ParamDict) {
        self.scale = pd.get_float(0, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_float(0, self.scale, Self::default().scale)
    }
}

#[derive(Debug, Clone)]
pub struct Quantize {
    pub scale: f32,
}

impl Default for Quantize {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl LayerSchema for Quantize {
    fn load_param(&mut self, pd: &ParamDict) {
        self.scale = pd.get_float(0, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_float(0, self.scale, Self::default().scale)
    }
}

#[derive(Debug, Clone)]
pub struct Requantize {
    pub scale_in: f32,
    pub scale_out: f32,
    pub bias_term: i32,
    pub bias_data_size: i32,
    pub fusion_relu: i32,
    pub bias_data: Tensor,
}

impl Default for Requantize {
    fn default() -> Self {
        Self {
            scale_in: 1.0,
            scale_out: 1.0,
            bias_term: 0,
            bias_data_size: 0,
            fusion_relu: 0,
            bias_data: Tensor::default(),
        }
    }
}

impl LayerSchema for Requantize {
    fn load_param(&mut self, pd: &ParamDict) {
        self.scale_in = pd.get_float(0, 1.0);
        self.scale_out = pd.get_float(1, 1.0);
        self.bias_term = pd.get_int(2, 0);
        self.bias_data_size = pd.get_int(3, 0);
        self.fusion_relu = pd.get_int(4, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.bias_data_size as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_float(0, self.scale_in, def.scale_in)?;
        pw.push_float(1, self.scale_out, def.scale_out)?;
        pw.push_int(2, self.bias_term, def.bias_term)?;
        pw.push_int(3, self.bias_data_size, def.bias_data_size)?;
        pw.push_int(4, self.fusion_relu, def.fusion_relu)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.bias_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropout_default_scale_is_one() {
        let op = Dropout::default();
        assert_eq!(op.scale, 1.0);
        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_eltwise_coeffs_array() {
        let mut pd = ParamDict::new();
        pd.parse_token("0=1", 1).unwrap();
        pd.parse_token("-23301=2,0.500000,0.500000", 1).unwrap();
        let mut op = Eltwise::default();
        op.load_param(&pd);
        assert_eq!(op.op_type, 1);
        assert_eq!(op.coeffs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_requantize_bias_roundtrips() {
        let mut bytes = Vec::new();
        WeightWriter::new(&mut bytes, tensor_core::DType::F32)
            .write_raw(&Tensor::from_values(vec![1.5, -0.5]))
            .unwrap();
        let mut op = Requantize {
            bias_term: 1,
            bias_data_size: 2,
            ..Requantize::default()
        };
        op.load_model(&mut WeightReader::new(bytes.as_slice())).unwrap();

        let mut saved = Vec::new();
        op.save_model(&mut WeightWriter::new(&mut saved, tensor_core::DType::F32))
            .unwrap();
        assert_eq!(saved, bytes);
    }
}
