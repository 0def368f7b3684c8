// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The affine family: convolutions, deconvolutions, and the fully-connected
//! layer.
//!
//! All five kinds share the same weight layout from the rewrite engine's
//! point of view — `num_output` channel slices of `weight_data_size /
//! num_output` elements plus an optional per-channel bias — and the same
//! trailing-activation slot (`activation_type` 0 none, 1 ReLU, 2 LeakyReLU
//! with slope, 3 Clip with min/max, 4 Sigmoid). [`AffineMut`] in the parent
//! module is the borrowed view over exactly that shared surface.
//!
//! The weight tensor is the layer's tagged record; the bias follows untagged
//! and only when `bias_term` is set.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use crate::weights::{WeightReader, WeightWriter};
use crate::ModelError;
use std::io::{self, Read, Write};
use tensor_core::Tensor;

/// Borrowed view over the affine kinds; see [`super::LayerKind::affine_mut`].
pub struct AffineMut<'a> {
    pub num_output: i32,
    pub weight_data_size: i32,
    pub bias_term: &'a mut i32,
    pub weight_data: &'a mut Tensor,
    pub bias_data: &'a mut Tensor,
    pub activation_type: &'a mut i32,
    pub activation_params: &'a mut Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Convolution {
    pub num_output: i32,
    pub kernel_w: i32,
    pub kernel_h: i32,
    pub dilation_w: i32,
    pub dilation_h: i32,
    pub stride_w: i32,
    pub stride_h: i32,
    pub pad_w: i32,
    pub pad_h: i32,
    pub bias_term: i32,
    pub weight_data_size: i32,
    pub int8_scale_term: i32,
    pub activation_type: i32,
    pub activation_params: Vec<f32>,
    /// Preferred kernel implementation, assigned by the fastest-conv search.
    pub impl_type: i32,
    pub weight_data: Tensor,
    pub bias_data: Tensor,
}

impl Default for Convolution {
    fn default() -> Self {
        Self {
            num_output: 0,
            kernel_w: 0,
            kernel_h: 0,
            dilation_w: 1,
            dilation_h: 1,
            stride_w: 1,
            stride_h: 1,
            pad_w: 0,
            pad_h: 0,
            bias_term: 0,
            weight_data_size: 0,
            int8_scale_term: 0,
            activation_type: 0,
            activation_params: Vec::new(),
            impl_type: 0,
            weight_data: Tensor::default(),
            bias_data: Tensor::default(),
        }
    }
}

impl LayerSchema for Convolution {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_output = pd.get_int(0, 0);
        self.kernel_w = pd.get_int(1, 0);
        self.kernel_h = pd.get_int(11, self.kernel_w);
        self.dilation_w = pd.get_int(2, 1);
        self.dilation_h = pd.get_int(12, self.dilation_w);
        self.stride_w = pd.get_int(3, 1);
        self.stride_h = pd.get_int(13, self.stride_w);
        self.pad_w = pd.get_int(4, 0);
        self.pad_h = pd.get_int(14, self.pad_w);
        self.bias_term = pd.get_int(5, 0);
        self.weight_data_size = pd.get_int(6, 0);
        self.int8_scale_term = pd.get_int(8, 0);
        self.activation_type = pd.get_int(9, 0);
        self.activation_params = pd.get_float_array(10);
        self.impl_type = pd.get_int(15, 0);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        if self.int8_scale_term != 0 {
            return Err(ModelError::Int8NotSupported);
        }
        self.weight_data = mb.read_tagged(self.weight_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.num_output as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_output, def.num_output)?;
        pw.push_int(1, self.kernel_w, def.kernel_w)?;
        pw.push_int(11, self.kernel_h, self.kernel_w)?;
        pw.push_int(2, self.dilation_w, def.dilation_w)?;
        pw.push_int(12, self.dilation_h, self.dilation_w)?;
        pw.push_int(3, self.stride_w, def.stride_w)?;
        pw.push_int(13, self.stride_h, self.stride_w)?;
        pw.push_int(4, self.pad_w, def.pad_w)?;
        pw.push_int(14, self.pad_h, self.pad_w)?;
        pw.push_int(5, self.bias_term, def.bias_term)?;
        pw.push_int(6, self.weight_data_size, def.weight_data_size)?;
        pw.push_int(8, self.int8_scale_term, def.int8_scale_term)?;
        pw.push_int(9, self.activation_type, def.activation_type)?;
        if !self.activation_params.is_empty() {
            pw.push_float_array(10, &self.activation_params)?;
        }
        pw.push_int(15, self.impl_type, def.impl_type)?;
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_tagged(&self.weight_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone)]
pub struct ConvolutionDepthWise {
    pub num_output: i32,
    pub kernel_w: i32,
    pub kernel_h: i32,
    pub dilation_w: i32,
    pub dilation_h: i32,
    pub stride_w: i32,
    pub stride_h: i32,
    pub pad_w: i32,
    pub pad_h: i32,
    pub bias_term: i32,
    pub weight_data_size: i32,
    pub group: i32,
    pub int8_scale_term: i32,
    pub activation_type: i32,
    pub activation_params: Vec<f32>,
    pub weight_data: Tensor,
    pub bias_data: Tensor,
}

impl Default for ConvolutionDepthWise {
    fn default() -> Self {
        Self {
            num_output: 0,
            kernel_w: 0,
            kernel_h: 0,
            dilation_w: 1,
            dilation_h: 1,
            stride_w: 1,
            stride_h: 1,
            pad_w: 0,
            pad_h: 0,
            bias_term: 0,
            weight_data_size: 0,
            group: 1,
            int8_scale_term: 0,
            activation_type: 0,
            activation_params: Vec::new(),
            weight_data: Tensor::default(),
            bias_data: Tensor::default(),
        }
    }
}

impl LayerSchema for ConvolutionDepthWise {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_output = pd.get_int(0, 0);
        self.kernel_w = pd.get_int(1, 0);
        self.kernel_h = pd.get_int(11, self.kernel_w);
        self.dilation_w = pd.get_int(2, 1);
        self.dilation_h = pd.get_int(12, self.dilation_w);
        self.stride_w = pd.get_int(3, 1);
        self.stride_h = pd.get_int(13, self.stride_w);
        self.pad_w = pd.get_int(4, 0);
        self.pad_h = pd.get_int(14, self.pad_w);
        self.bias_term = pd.get_int(5, 0);
        self.weight_data_size = pd.get_int(6, 0);
        self.group = pd.get_int(7, 1);
        self.int8_scale_term = pd.get_int(8, 0);
        self.activation_type = pd.get_int(9, 0);
        self.activation_params = pd.get_float_array(10);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        if self.int8_scale_term != 0 {
            return Err(ModelError::Int8NotSupported);
        }
        self.weight_data = mb.read_tagged(self.weight_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.num_output as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_output, def.num_output)?;
        pw.push_int(1, self.kernel_w, def.kernel_w)?;
        pw.push_int(11, self.kernel_h, self.kernel_w)?;
        pw.push_int(2, self.dilation_w, def.dilation_w)?;
        pw.push_int(12, self.dilation_h, self.dilation_w)?;
        pw.push_int(3, self.stride_w, def.stride_w)?;
        pw.push_int(13, self.stride_h, self.stride_w)?;
        pw.push_int(4, self.pad_w, def.pad_w)?;
        pw.push_int(14, self.pad_h, self.pad_w)?;
        pw.push_int(5, self.bias_term, def.bias_term)?;
        pw.push_int(6, self.weight_data_size, def.weight_data_size)?;
        pw.push_int(7, self.group, def.group)?;
        pw.push_int(8, self.int8_scale_term, def.int8_scale_term)?;
        pw.push_int(9, self.activation_type, def.activation_type)?;
        if !self.activation_params.is_empty() {
            pw.push_float_array(10, &self.activation_params)?;
        }
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_tagged(&self.weight_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone)]
pub struct Deconvolution {
    pub num_output: i32,
    pub kernel_w: i32,
    pub kernel_h: i32,
    pub dilation_w: i32,
    pub dilation_h: i32,
    pub stride_w: i32,
    pub stride_h: i32,
    pub pad_w: i32,
    pub pad_h: i32,
    pub bias_term: i32,
    pub weight_data_size: i32,
    pub output_pad_w: i32,
    pub output_pad_h: i32,
    pub activation_type: i32,
    pub activation_params: Vec<f32>,
    pub weight_data: Tensor,
    pub bias_data: Tensor,
}

impl Default for Deconvolution {
    fn default() -> Self {
        Self {
            num_output: 0,
            kernel_w: 0,
            kernel_h: 0,
            dilation_w: 1,
            dilation_h: 1,
            stride_w: 1,
            stride_h: 1,
            pad_w: 0,
            pad_h: 0,
            bias_term: 0,
            weight_data_size: 0,
            output_pad_w: 0,
            output_pad_h: 0,
            activation_type: 0,
            activation_params: Vec::new(),
            weight_data: Tensor::default(),
            bias_data: Tensor::default(),
        }
    }
}

impl LayerSchema for Deconvolution {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_output = pd.get_int(0, 0);
        self.kernel_w = pd.get_int(1, 0);
        self.kernel_h = pd.get_int(11, self.kernel_w);
        self.dilation_w = pd.get_int(2, 1);
        self.dilation_h = pd.get_int(12, self.dilation_w);
        self.stride_w = pd.get_int(3, 1);
        self.stride_h = pd.get_int(13, self.stride_w);
        self.pad_w = pd.get_int(4, 0);
        self.pad_h = pd.get_int(14, self.pad_w);
        self.bias_term = pd.get_int(5, 0);
        self.weight_data_size = pd.get_int(6, 0);
        self.output_pad_w = pd.get_int(8, 0);
        self.output_pad_h = pd.get_int(18, self.output_pad_w);
        self.activation_type = pd.get_int(9, 0);
        self.activation_params = pd.get_float_array(10);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        self.weight_data = mb.read_tagged(self.weight_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.num_output as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_output, def.num_output)?;
        pw.push_int(1, self.kernel_w, def.kernel_w)?;
        pw.push_int(11, self.kernel_h, self.kernel_w)?;
        pw.push_int(2, self.dilation_w, def.dilation_w)?;
        pw.push_int(12, self.dilation_h, self.dilation_w)?;
        pw.push_int(3, self.stride_w, def.stride_w)?;
        pw.push_int(13, self.stride_h, self.stride_w)?;
        pw.push_int(4, self.pad_w, def.pad_w)?;
        pw.push_int(14, self.pad_h, self.pad_w)?;
        pw.push_int(5, self.bias_term, def.bias_term)?;
        pw.push_int(6, self.weight_data_size, def.weight_data_size)?;
        pw.push_int(8, self.output_pad_w, def.output_pad_w)?;
        pw.push_int(18, self.output_pad_h, self.output_pad_w)?;
        pw.push_int(9, self.activation_type, def.activation_type)?;
        if !self.activation_params.is_empty() {
            pw.push_float_array(10, &self.activation_params)?;
        }
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_tagged(&self.weight_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone)]
pub struct DeconvolutionDepthWise {
    pub num_output: i32,
    pub kernel_w: i32,
    pub kernel_h: i32,
    pub dilation_w: i32,
    pub dilation_h: i32,
    pub stride_w: i32,
    pub stride_h: i32,
    pub pad_w: i32,
    pub pad_h: i32,
    pub bias_term: i32,
    pub weight_data_size: i32,
    pub group: i32,
    pub activation_type: i32,
    pub activation_params: Vec<f32>,
    pub weight_data: Tensor,
    pub bias_data: Tensor,
}

impl Default for DeconvolutionDepthWise {
    fn default() -> Self {
        Self {
            num_output: 0,
            kernel_w: 0,
            kernel_h: 0,
            dilation_w: 1,
            dilation_h: 1,
            stride_w: 1,
            stride_h: 1,
            pad_w: 0,
            pad_h: 0,
            bias_term: 0,
            weight_data_size: 0,
            group: 1,
            activation_type: 0,
            activation_params: Vec::new(),
            weight_data: Tensor::default(),
            bias_data: Tensor::default(),
        }
    }
}

impl LayerSchema for DeconvolutionDepthWise {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_output = pd.get_int(0, 0);
        self.kernel_w = pd.get_int(1, 0);
        self.kernel_h = pd.get_int(11, self.kernel_w);
        self.dilation_w = pd.get_int(2, 1);
        self.dilation_h = pd.get_int(12, self.dilation_w);
        self.stride_w = pd.get_int(3, 1);
        self.stride_h = pd.get_int(13, self.stride_w);
        self.pad_w = pd.get_int(4, 0);
        self.pad_h = pd.get_int(14, self.pad_w);
        self.bias_term = pd.get_int(5, 0);
        self.weight_data_size = pd.get_int(6, 0);
        self.group = pd.get_int(7, 1);
        self.activation_type = pd.get_int(9, 0);
        self.activation_params = pd.get_float_array(10);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        self.weight_data = mb.read_tagged(self.weight_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.num_output as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_output, def.num_output)?;
        pw.push_int(1, self.kernel_w, def.kernel_w)?;
        pw.push_int(11, self.kernel_h, self.kernel_w)?;
        pw.push_int(2, self.dilation_w, def.dilation_w)?;
        pw.push_int(12, self.dilation_h, self.dilation_w)?;
        pw.push_int(3, self.stride_w, def.stride_w)?;
        pw.push_int(13, self.stride_h, self.stride_w)?;
        pw.push_int(4, self.pad_w, def.pad_w)?;
        pw.push_int(14, self.pad_h, self.pad_w)?;
        pw.push_int(5, self.bias_term, def.bias_term)?;
        pw.push_int(6, self.weight_data_size, def.weight_data_size)?;
        pw.push_int(7, self.group, def.group)?;
        pw.push_int(9, self.activation_type, def.activation_type)?;
        if !self.activation_params.is_empty() {
            pw.push_float_array(10, &self.activation_params)?;
        }
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_tagged(&self.weight_data)?;
        wb.write_raw(&self.bias_data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InnerProduct {
    pub num_output: i32,
    pub bias_term: i32,
    pub weight_data_size: i32,
    pub int8_scale_term: i32,
    pub activation_type: i32,
    pub activation_params: Vec<f32>,
    pub weight_data: Tensor,
    pub bias_data: Tensor,
}

impl LayerSchema for InnerProduct {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_output = pd.get_int(0, 0);
        self.bias_term = pd.get_int(1, 0);
        self.weight_data_size = pd.get_int(2, 0);
        self.int8_scale_term = pd.get_int(8, 0);
        self.activation_type = pd.get_int(9, 0);
        self.activation_params = pd.get_float_array(10);
    }

    fn load_model<R: Read>(&mut self, mb: &mut WeightReader<R>) -> Result<(), ModelError> {
        if self.int8_scale_term != 0 {
            return Err(ModelError::Int8NotSupported);
        }
        self.weight_data = mb.read_tagged(self.weight_data_size as usize)?;
        if self.bias_term != 0 {
            self.bias_data = mb.read_raw(self.num_output as usize)?;
        }
        Ok(())
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_output, def.num_output)?;
        pw.push_int(1, self.bias_term, def.bias_term)?;
        pw.push_int(2, self.weight_data_size, def.weight_data_size)?;
        pw.push_int(8, self.int8_scale_term, def.int8_scale_term)?;
        pw.push_int(9, self.activation_type, def.activation_type)?;
        if !self.activation_params.is_empty() {
            pw.push_float_array(10, &self.activation_params)?;
        }
        Ok(())
    }

    fn save_model<W: Write>(&self, wb: &mut WeightWriter<W>) -> io::Result<()> {
        wb.write_tagged(&self.weight_data)?;
        wb.write_raw(&self.bias_data)
    }
}
