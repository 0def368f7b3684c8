// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Spatial aggregation kinds.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use std::io::{self, Write};

/// Pooling over a window, or over the whole spatial extent when
/// `global_pooling` is set — the state two of the rewrite passes key on,
/// because a global pool leaves a 1×1 spatial tensor behind.
#[derive(Debug, Clone)]
pub struct Pooling {
    pub pooling_type: i32,
    pub kernel_w: i32,
    pub kernel_h: i32,
    pub stride_w: i32,
    pub stride_h: i32,
    pub pad_left: i32,
    pub pad_right: i32,
    pub pad_top: i32,
    pub pad_bottom: i32,
    pub global_pooling: i32,
    pub pad_mode: i32,
}

impl Default for Pooling {
    fn default() -> Self {
        Self {
            pooling_type: 0,
            kernel_w: 0,
            kernel_h: 0,
            stride_w: 1,
            stride_h: 1,
            pad_left: 0,
            pad_right: 0,
            pad_top: 0,
            pad_bottom: 0,
            global_pooling: 0,
            pad_mode: 0,
        }
    }
}

impl LayerSchema for Pooling {
    fn load_param(&mut self, pd: &ParamDict) {
        self.pooling_type = pd.get_int(0, 0);
        self.kernel_w = pd.get_int(1, 0);
        self.kernel_h = pd.get_int(11, self.kernel_w);
        self.stride_w = pd.get_int(2, 1);
        self.stride_h = pd.get_int(12, self.stride_w);
        self.pad_left = pd.get_int(3, 0);
        self.pad_top = pd.get_int(13, self.pad_left);
        self.pad_right = pd.get_int(14, self.pad_left);
        self.pad_bottom = pd.get_int(15, self.pad_top);
        self.global_pooling = pd.get_int(4, 0);
        self.pad_mode = pd.get_int(5, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.pooling_type, def.pooling_type)?;
        pw.push_int(1, self.kernel_w, def.kernel_w)?;
        pw.push_int(11, self.kernel_h, self.kernel_w)?;
        pw.push_int(2, self.stride_w, def.stride_w)?;
        pw.push_int(12, self.stride_h, self.stride_w)?;
        pw.push_int(3, self.pad_left, def.pad_left)?;
        pw.push_int(13, self.pad_top, self.pad_left)?;
        pw.push_int(14, self.pad_right, self.pad_left)?;
        pw.push_int(15, self.pad_bottom, self.pad_top)?;
        pw.push_int(4, self.global_pooling, def.global_pooling)?;
        pw.push_int(5, self.pad_mode, def.pad_mode)
    }
}

#[derive(Debug, Clone)]
pub struct ROIPooling {
    pub pooled_width: i32,
    pub pooled_height: i32,
    pub spatial_scale: f32,
}

impl Default for ROIPooling {
    fn default() -> Self {
        Self {
            pooled_width: 0,
            pooled_height: 0,
            spatial_scale: 1.0,
        }
    }
}

impl LayerSchema for ROIPooling {
    fn load_param(&mut self, pd: &ParamDict) {
        self.pooled_width = pd.get_int(0, 0);
        self.pooled_height = pd.get_int(1, 0);
        self.spatial_scale = pd.get_float(2, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.pooled_width, def.pooled_width)?;
        pw.push_int(1, self.pooled_height, def.pooled_height)?;
        pw.push_float(2, self.spatial_scale, def.spatial_scale)
    }
}

#[derive(Debug, Clone)]
pub struct ROIAlign {
    pub pooled_width: i32,
    pub pooled_height: i32,
    pub spatial_scale: f32,
}

impl Default for ROIAlign {
    fn default() -> Self {
        Self {
            pooled_width: 0,
            pooled_height: 0,
            spatial_scale: 1.0,
        }
    }
}

impl LayerSchema for ROIAlign {
    fn load_param(&mut self, pd: &ParamDict) {
        self.pooled_width = pd.get_int(0, 0);
        self.pooled_height = pd.get_int(1, 0);
        self.spatial_scale = pd.get_float(2, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.pooled_width, def.pooled_width)?;
        pw.push_int(1, self.pooled_height, def.pooled_height)?;
        pw.push_float(2, self.spatial_scale, def.spatial_scale)
    }
}

#[derive(Debug, Clone)]
pub struct PSROIPooling {
    pub pooled_width: i32,
    pub pooled_height: i32,
    pub spatial_scale: f32,
    pub output_dim: i32,
}

impl Default for PSROIPooling {
    fn default() -> Self {
        Self {
            pooled_width: 7,
            pooled_height: 7,
            spatial_scale: 0.0625,
            output_dim: 0,
        }
    }
}

impl LayerSchema for PSROIPooling {
    fn load_param(&mut self, pd: &ParamDict) {
        self.pooled_width = pd.get_int(0, 7);
        self.pooled_height = pd.get_int(1, 7);
        self.spatial_scale = pd.get_float(2, 0.0625);
        self.output_dim = pd.get_int(3, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.pooled_width, def.pooled_width)?;
        pw.push_int(1, self.pooled_height, def.pooled_height)?;
        pw.push_float(2, self.spatial_scale, def.spatial_scale)?;
        pw.push_int(3, self.output_dim, def.output_dim)
    }
}

#[derive(Debug, Clone)]
pub struct Reduction {
    pub operation: i32,
    pub dim: i32,
    pub coeff: f32,
}

impl Default for Reduction {
    fn default() -> Self {
        Self {
            operation: 0,
            dim: 0,
            coeff: 1.0,
        }
    }
}

impl LayerSchema for Reduction {
    fn load_param(&mut self, pd: &ParamDict) {
        self.operation = pd.get_int(0, 0);
        self.dim = pd.get_int(1, 0);
        self.coeff = pd.get_float(2, 1.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.operation, def.operation)?;
        pw.push_int(1, self.dim, def.dim)?;
        pw.push_float(2, self.coeff, def.coeff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooling_pad_pairing() {
        // pad_top/pad_right default to pad_left, pad_bottom to pad_top.
        let mut pd = ParamDict::new();
        pd.parse_token("3=2", 1).unwrap();
        let mut op = Pooling::default();
        op.load_param(&pd);
        assert_eq!(op.pad_left, 2);
        assert_eq!(op.pad_top, 2);
        assert_eq!(op.pad_right, 2);
        assert_eq!(op.pad_bottom, 2);

        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), " 3=2");
    }

    #[test]
    fn test_global_pooling_flag() {
        let mut pd = ParamDict::new();
        pd.parse_token("0=1", 1).unwrap();
        pd.parse_token("4=1", 1).unwrap();
        let mut op = Pooling::default();
        op.load_param(&pd);
        assert_eq!(op.pooling_type, 1);
        assert_eq!(op.global_pooling, 1);
    }
}
