// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Kinds that reorganise data without arithmetic, plus graph entry points.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use std::io::{self, Write};

#[derive(Debug, Clone, Default)]
pub struct Concat {
    pub axis: i32,
}

impl LayerSchema for Concat {
    fn load_param(&mut self, pd: &ParamDict) {
        self.axis = pd.get_int(0, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.axis, Self::default().axis)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Crop {
    pub woffset: i32,
    pub hoffset: i32,
    pub coffset: i32,
    pub outw: i32,
    pub outh: i32,
    pub outc: i32,
}

impl LayerSchema for Crop {
    fn load_param(&mut self, pd: &ParamDict) {
        self.woffset = pd.get_int(0, 0);
        self.hoffset = pd.get_int(1, 0);
        self.coffset = pd.get_int(2, 0);
        self.outw = pd.get_int(3, 0);
        self.outh = pd.get_int(4, 0);
        self.outc = pd.get_int(5, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.woffset, def.woffset)?;
        pw.push_int(1, self.hoffset, def.hoffset)?;
        pw.push_int(2, self.coffset, def.coffset)?;
        pw.push_int(3, self.outw, def.outw)?;
        pw.push_int(4, self.outh, def.outh)?;
        pw.push_int(5, self.outc, def.outc)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Flatten;

impl LayerSchema for Flatten {}

#[derive(Debug, Clone, Default)]
pub struct Input {
    pub w: i32,
    pub h: i32,
    pub c: i32,
}

impl LayerSchema for Input {
    fn load_param(&mut self, pd: &ParamDict) {
        self.w = pd.get_int(0, 0);
        self.h = pd.get_int(1, 0);
        self.c = pd.get_int(2, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.w, def.w)?;
        pw.push_int(1, self.h, def.h)?;
        pw.push_int(2, self.c, def.c)
    }
}

#[derive(Debug, Clone)]
pub struct Interp {
    pub resize_type: i32,
    pub height_scale: f32,
    pub width_scale: f32,
    pub output_height: i32,
    pub output_width: i32,
}

impl Default for Interp {
    fn default() -> Self {
        Self {
            resize_type: 0,
            height_scale: 1.0,
            width_scale: 1.0,
            output_height: 0,
            output_width: 0,
        }
    }
}

impl LayerSchema for Interp {
    fn load_param(&mut self, pd: &ParamDict) {
        self.resize_type = pd.get_int(0, 0);
        self.height_scale = pd.get_float(1, 1.0);
        self.width_scale = pd.get_float(2, 1.0);
        self.output_height = pd.get_int(3, 0);
        self.output_width = pd.get_int(4, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.resize_type, def.resize_type)?;
        pw.push_float(1, self.height_scale, def.height_scale)?;
        pw.push_float(2, self.width_scale, def.width_scale)?;
        pw.push_int(3, self.output_height, def.output_height)?;
        pw.push_int(4, self.output_width, def.output_width)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Padding {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
    pub pad_type: i32,
    pub value: f32,
}

impl LayerSchema for Padding {
    fn load_param(&mut self, pd: &ParamDict) {
        self.top = pd.get_int(0, 0);
        self.bottom = pd.get_int(1, 0);
        self.left = pd.get_int(2, 0);
        self.right = pd.get_int(3, 0);
        self.pad_type = pd.get_int(4, 0);
        self.value = pd.get_float(5, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.top, def.top)?;
        pw.push_int(1, self.bottom, def.bottom)?;
        pw.push_int(2, self.left, def.left)?;
        pw.push_int(3, self.right, def.right)?;
        pw.push_int(4, self.pad_type, def.pad_type)?;
        pw.push_float(5, self.value, def.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Permute {
    pub order_type: i32,
}

impl LayerSchema for Permute {
    fn load_param(&mut self, pd: &ParamDict) {
        self.order_type = pd.get_int(0, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.order_type, Self::default().order_type)
    }
}

#[derive(Debug, Clone)]
pub struct Reorg {
    pub stride: i32,
}

impl Default for Reorg {
    fn default() -> Self {
        Self { stride: 1 }
    }
}

impl LayerSchema for Reorg {
    fn load_param(&mut self, pd: &ParamDict) {
        self.stride = pd.get_int(0, 1);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.stride, Self::default().stride)
    }
}

/// Target extents use `-233` as the "leave this dimension alone" marker.
#[derive(Debug, Clone)]
pub struct Reshape {
    pub w: i32,
    pub h: i32,
    pub c: i32,
    pub permute: i32,
}

impl Default for Reshape {
    fn default() -> Self {
        Self {
            w: -233,
            h: -233,
            c: -233,
            permute: 0,
        }
    }
}

impl LayerSchema for Reshape {
    fn load_param(&mut self, pd: &ParamDict) {
        self.w = pd.get_int(0, -233);
        self.h = pd.get_int(1, -233);
        self.c = pd.get_int(2, -233);
        self.permute = pd.get_int(3, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.w, def.w)?;
        pw.push_int(1, self.h, def.h)?;
        pw.push_int(2, self.c, def.c)?;
        pw.push_int(3, self.permute, def.permute)
    }
}

#[derive(Debug, Clone)]
pub struct ShuffleChannel {
    pub group: i32,
}

impl Default for ShuffleChannel {
    fn default() -> Self {
        Self { group: 1 }
    }
}

impl LayerSchema for ShuffleChannel {
    fn load_param(&mut self, pd: &ParamDict) {
        self.group = pd.get_int(0, 1);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        pw.push_int(0, self.group, Self::default().group)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Slice {
    pub slices: Vec<i32>,
    pub axis: i32,
}

impl LayerSchema for Slice {
    fn load_param(&mut self, pd: &ParamDict) {
        self.slices = pd.get_int_array(0);
        self.axis = pd.get_int(1, 0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        if !self.slices.is_empty() {
            pw.push_int_array(0, &self.slices)?;
        }
        pw.push_int(1, self.axis, Self::default().axis)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Split;

impl LayerSchema for Split {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_sentinel_defaults() {
        let op = Reshape::default();
        assert_eq!((op.w, op.h, op.c), (-233, -233, -233));
        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_slice_points() {
        let mut pd = ParamDict::new();
        pd.parse_token("-23300=2,4,8", 1).unwrap();
        pd.parse_token("1=1", 1).unwrap();
        let mut op = Slice::default();
        op.load_param(&pd);
        assert_eq!(op.slices, vec![4, 8]);
        assert_eq!(op.axis, 1);

        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), " -23300=2,4,8 1=1");
    }

    #[test]
    fn test_input_extents() {
        let mut pd = ParamDict::new();
        for t in ["0=224", "1=224", "2=3"] {
            pd.parse_token(t, 1).unwrap();
        }
        let mut op = Input::default();
        op.load_param(&pd);
        assert_eq!((op.w, op.h, op.c), (224, 224, 3));
    }
}
