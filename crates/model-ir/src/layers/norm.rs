// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Normalisation and per-channel affine kinds.
//!
//! `BatchNorm` and `Scale` are the fusion pipeline's main feedstock: both
//! reduce to a per-channel multiply-add, which is why they fold into each
//! other and into any affine predecessor.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use crate::weights::{WeightReader, WeightWriter};
use crate::ModelError;
use std::io::{self, Read, Write};
use tensor_core::Tensor;

/// Inference-time batch normalisation: per channel,
/// `y = (x - mean) / sqrt(var + eps) * slope + bias`.
#[derive(Debug, Clone, Default)]
pub struct BatchNorm {
    pub channels: i32,
    pub eps: f32,
    pub slope_data: Tensor,
    pub mean_data: Tensor,
    pub var_data: Tensor,
    pub bias_data: Tensor,
}

impl LayerSchema for BatchNorm {
    fn load_param(&mut self, pd: &ParamDict) {
        self.channels = pd.get_int(0, 0);
        self.eps = pd.get_float(1, 0.0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        let n = self.channels as usize;
        self.slope_data = mb.read_raw(n)?;
        self.mean_data = mb.read_raw(n)?;
        self.var_data = mb.read_raw(n)?;
        self.bias_data = mb.read_raw(n)?;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.channels, def.channels)?;
        pw.push_float(1, self.eps, def.eps)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.slope_data)?;
        wb.write_raw(&self.mean_data)?;
        wb.write_raw(&self.var_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bias {
    pub bias_data_size: i32,
    pub bias_data: Tensor,
}

impl LayerSchema for Bias {
    fn load_param(&mut self, pd: &ParamDict) {
        self.bias_data_size = pd.get_int(0, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        self.bias_data = mb.read_raw(self.bias_data_size as usize)?;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.bias_data_size, Self::default().bias_data_size)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.bias_data)
    }
}

/// Per-channel scale, optionally with a bias. A `scale_data_size` of `-233`
/// means the scale arrives as a second input blob instead of a weight.
#[derive(Debug, Clone, Default)]
pub struct Scale {
    pub scale_data_size: i32,
    pub bias_term: i32,
    pub scale_data: Tensor,
    pub bias_data: Tensor,
}

impl LayerSchema for Scale {
    fn load_param(&mut self, pd: &ParamDict) {
        self.scale_data_size = pd.get_int(0, 0);
        self.bias_term = pd.get_int(1, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        if self.scale_data_size == -233 {
            return Ok(());
        }
        self.scale_data = mb.read_raw(self.scale_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.scale_data_size as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.scale_data_size, def.scale_data_size)?;
        pw.push_int(1, self.bias_term, def.bias_term)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.scale_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone)]
pub struct InstanceNorm {
    pub channels: i32,
    pub eps: f32,
    pub gamma_data: Tensor,
    pub beta_data: Tensor,
}

impl Default for InstanceNorm {
    fn default() -> Self {
        Self {
            channels: 0,
            eps: 0.001,
            gamma_data: Tensor::default(),
            beta_data: Tensor::default(),
        }
    }
}

impl LayerSchema for InstanceNorm {
    fn load_param(&mut self, pd: &ParamDict) {
        self.channels = pd.get_int(0, 0);
        self.eps = pd.get_float(1, 0.001);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        let n = self.channels as usize;
        self.gamma_data = mb.read_raw(n)?;
        self.beta_data = mb.read_raw(n)?;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.channels, def.channels)?;
        pw.push_float(1, self.eps, def.eps)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.gamma_data)?;
        wb.write_raw(&self.beta_data)
    }
}

#[derive(Debug, Clone)]
pub struct LRN {
    pub region_type: i32,
    pub local_size: i32,
    pub alpha: f32,
    pub beta: f32,
    pub bias: f32,
}

impl Default for LRN {
    fn default() -> Self {
        Self {
            region_type: 0,
            local_size: 5,
            alpha: 1.0,
            beta: 0.75,
            bias: 1.0,
        }
    }
}

impl LayerSchema for LRN {
    fn load_param(&mut self, pd: &ParamDict) {
        self.region_type = pd.get_int(0, 0);
        self.local_size = pd.get_int(1, 5);
        self.alpha = pd.get_float(2, 1.0);
        self.beta = pd.get_float(3, 0.75);
        self.bias = pd.get_float(4, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.region_type, def.region_type)?;
        pw.push_int(1, self.local_size, def.local_size)?;
        pw.push_float(2, self.alpha, def.alpha)?;
        pw.push_float(3, self.beta, def.beta)?;
        pw.push_float(4, self.bias, def.bias)
    }
}

#[derive(Debug, Clone)]
pub struct MVN {
    pub normalize_variance: i32,
    pub across_channels: i32,
    pub eps: f32,
}

impl Default for MVN {
    fn default() -> Self {
        Self {
            normalize_variance: 0,
            across_channels: 0,
            eps: 0.0001,
        }
    }
}

impl LayerSchema for MVN {
    fn load_param(&mut self, pd: &ParamDict) {
        self.normalize_variance = pd.get_int(0, 0);
        self.across_channels = pd.get_int(1, 0);
        self.eps = pd.get_float(2, 0.0001);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.normalize_variance, def.normalize_variance)?;
        pw.push_int(1, self.across_channels, def.across_channels)?;
        pw.push_float(2, self.eps, def.eps)
    }
}

#[derive(Debug, Clone)]
pub struct Normalize {
    pub across_spatial: i32,
    pub channel_shared: i32,
    pub eps: f32,
    pub scale_data_size: i32,
    pub across_channel: i32,
    pub scale_data: Tensor,
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            across_spatial: 0,
            channel_shared: 0,
            eps: 0.0001,
            scale_data_size: 0,
            across_channel: 0,
            scale_data: Tensor::default(),
        }
    }
}

impl LayerSchema for Normalize {
    fn load_param(&mut self, pd: &ParamDict) {
        self.across_spatial = pd.get_int(0, 0);
        self.channel_shared = pd.get_int(1, 0);
        self.eps = pd.get_float(2, 0.0001);
        self.scale_data_size = pd.get_int(3, 0);
        self.across_channel = pd.get_int(4, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        self.scale_data = mb.read_raw(self.scale_data_size as usize)?;
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.across_spatial, def.across_spatial)?;
        pw.push_int(1, self.channel_shared, def.channel_shared)?;
        pw.push_float(2, self.eps, def.eps)?;
        pw.push_int(3, self.scale_data_size, def.scale_data_size)?;
        pw.push_int(4, self.across_channel, def.across_channel)
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_raw(&self.scale_data)
    }
}
