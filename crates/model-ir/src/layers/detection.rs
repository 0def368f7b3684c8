// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Object-detection heads. All parameter-only; none carry weight records.

use super::LayerSchema;
use crate::param::{ParamDict, ParamWriter};
use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct DetectionOutput {
    pub num_class: i32,
    pub nms_threshold: f32,
    pub nms_top_k: i32,
    pub keep_top_k: i32,
    pub confidence_threshold: f32,
    pub variances: [f32; 4],
}

impl Default for DetectionOutput {
    fn default() -> Self {
        Self {
            num_class: 0,
            nms_threshold: 0.05,
            nms_top_k: 300,
            keep_top_k: 100,
            confidence_threshold: 0.5,
            variances: [0.1, 0.1, 0.2, 0.2],
        }
    }
}

impl LayerSchema for DetectionOutput {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_class = pd.get_int(0, 0);
        self.nms_threshold = pd.get_float(1, 0.05);
        self.nms_top_k = pd.get_int(2, 300);
        self.keep_top_k = pd.get_int(3, 100);
        self.confidence_threshold = pd.get_float(4, 0.5);
        self.variances[0] = pd.get_float(5, 0.1);
        self.variances[1] = pd.get_float(6, 0.1);
        self.variances[2] = pd.get_float(7, 0.2);
        self.variances[3] = pd.get_float(8, 0.2);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_class, def.num_class)?;
        pw.push_float(1, self.nms_threshold, def.nms_threshold)?;
        pw.push_int(2, self.nms_top_k, def.nms_top_k)?;
        pw.push_int(3, self.keep_top_k, def.keep_top_k)?;
        pw.push_float(4, self.confidence_threshold, def.confidence_threshold)?;
        pw.push_float(5, self.variances[0], def.variances[0])?;
        pw.push_float(6, self.variances[1], def.variances[1])?;
        pw.push_float(7, self.variances[2], def.variances[2])?;
        pw.push_float(8, self.variances[3], def.variances[3])
    }
}

#[derive(Debug, Clone)]
pub struct PriorBox {
    pub min_sizes: Vec<f32>,
    pub max_sizes: Vec<f32>,
    pub aspect_ratios: Vec<f32>,
    pub variances: [f32; 4],
    pub flip: i32,
    pub clip: i32,
    pub image_width: i32,
    pub image_height: i32,
    pub step_width: f32,
    pub step_height: f32,
    pub offset: f32,
}

impl Default for PriorBox {
    fn default() -> Self {
        Self {
            min_sizes: Vec::new(),
            max_sizes: Vec::new(),
            aspect_ratios: Vec::new(),
            variances: [0.1, 0.1, 0.2, 0.2],
            flip: 1,
            clip: 0,
            image_width: 0,
            image_height: 0,
            step_width: -233.0,
            step_height: -233.0,
            offset: 0.0,
        }
    }
}

impl LayerSchema for PriorBox {
    fn load_param(&mut self, pd: &ParamDict) {
        self.min_sizes = pd.get_float_array(0);
        self.max_sizes = pd.get_float_array(1);
        self.aspect_ratios = pd.get_float_array(2);
        self.variances[0] = pd.get_float(3, 0.1);
        self.variances[1] = pd.get_float(4, 0.1);
        self.variances[2] = pd.get_float(5, 0.2);
        self.variances[3] = pd.get_float(6, 0.2);
        self.flip = pd.get_int(7, 1);
        self.clip = pd.get_int(8, 0);
        self.image_width = pd.get_int(9, 0);
        self.image_height = pd.get_int(10, 0);
        self.step_width = pd.get_float(11, -233.0);
        self.step_height = pd.get_float(12, -233.0);
        self.offset = pd.get_float(13, 0.0);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        if !self.min_sizes.is_empty() {
            pw.push_float_array(0, &self.min_sizes)?;
        }
        if !self.max_sizes.is_empty() {
            pw.push_float_array(1, &self.max_sizes)?;
        }
        if !self.aspect_ratios.is_empty() {
            pw.push_float_array(2, &self.aspect_ratios)?;
        }
        pw.push_float(3, self.variances[0], def.variances[0])?;
        pw.push_float(4, self.variances[1], def.variances[1])?;
        pw.push_float(5, self.variances[2], def.variances[2])?;
        pw.push_float(6, self.variances[3], def.variances[3])?;
        pw.push_int(7, self.flip, def.flip)?;
        pw.push_int(8, self.clip, def.clip)?;
        pw.push_int(9, self.image_width, def.image_width)?;
        pw.push_int(10, self.image_height, def.image_height)?;
        pw.push_float(11, self.step_width, def.step_width)?;
        pw.push_float(12, self.step_height, def.step_height)?;
        pw.push_float(13, self.offset, def.offset)
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub feat_stride: i32,
    pub base_size: i32,
    pub pre_nms_top_n: i32,
    pub after_nms_top_n: i32,
    pub nms_thresh: f32,
    pub min_size: i32,
}

impl Default for Proposal {
    fn default() -> Self {
        Self {
            feat_stride: 16,
            base_size: 16,
            pre_nms_top_n: 6000,
            after_nms_top_n: 300,
            nms_thresh: 0.7,
            min_size: 16,
        }
    }
}

impl LayerSchema for Proposal {
    fn load_param(&mut self, pd: &ParamDict) {
        self.feat_stride = pd.get_int(0, 16);
        self.base_size = pd.get_int(1, 16);
        self.pre_nms_top_n = pd.get_int(2, 6000);
        self.after_nms_top_n = pd.get_int(3, 300);
        self.nms_thresh = pd.get_float(4, 0.7);
        self.min_size = pd.get_int(5, 16);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.feat_stride, def.feat_stride)?;
        pw.push_int(1, self.base_size, def.base_size)?;
        pw.push_int(2, self.pre_nms_top_n, def.pre_nms_top_n)?;
        pw.push_int(3, self.after_nms_top_n, def.after_nms_top_n)?;
        pw.push_float(4, self.nms_thresh, def.nms_thresh)?;
        pw.push_int(5, self.min_size, def.min_size)
    }
}

#[derive(Debug, Clone)]
pub struct YoloDetectionOutput {
    pub num_class: i32,
    pub num_box: i32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub biases: Vec<f32>,
}

impl Default for YoloDetectionOutput {
    fn default() -> Self {
        Self {
            num_class: 20,
            num_box: 5,
            confidence_threshold: 0.01,
            nms_threshold: 0.45,
            biases: Vec::new(),
        }
    }
}

impl LayerSchema for YoloDetectionOutput {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_class = pd.get_int(0, 20);
        self.num_box = pd.get_int(1, 5);
        self.confidence_threshold = pd.get_float(2, 0.01);
        self.nms_threshold = pd.get_float(3, 0.45);
        self.biases = pd.get_float_array(4);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_class, def.num_class)?;
        pw.push_int(1, self.num_box, def.num_box)?;
        pw.push_float(2, self.confidence_threshold, def.confidence_threshold)?;
        pw.push_float(3, self.nms_threshold, def.nms_threshold)?;
        if !self.biases.is_empty() {
            pw.push_float_array(4, &self.biases)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Yolov3DetectionOutput {
    pub num_class: i32,
    pub num_box: i32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub biases: Vec<f32>,
    pub mask: Vec<i32>,
    pub anchors_scale: Vec<f32>,
}

impl Default for Yolov3DetectionOutput {
    fn default() -> Self {
        Self {
            num_class: 20,
            num_box: 5,
            confidence_threshold: 0.01,
            nms_threshold: 0.45,
            biases: Vec::new(),
            mask: Vec::new(),
            anchors_scale: Vec::new(),
        }
    }
}

impl LayerSchema for Yolov3DetectionOutput {
    fn load_param(&mut self, pd: &ParamDict) {
        self.num_class = pd.get_int(0, 20);
        self.num_box = pd.get_int(1, 5);
        self.confidence_threshold = pd.get_float(2, 0.01);
        self.nms_threshold = pd.get_float(3, 0.45);
        self.biases = pd.get_float_array(4);
        self.mask = pd.get_int_array(5);
        self.anchors_scale = pd.get_float_array(6);
    }

    fn save_param<W: Write>(&self, pw: &mut ParamWriter<W>) -> io::Result<()> {
        let def = Self::default();
        pw.push_int(0, self.num_class, def.num_class)?;
        pw.push_int(1, self.num_box, def.num_box)?;
        pw.push_float(2, self.confidence_threshold, def.confidence_threshold)?;
        pw.push_float(3, self.nms_threshold, def.nms_threshold)?;
        if !self.biases.is_empty() {
            pw.push_float_array(4, &self.biases)?;
        }
        if !self.mask.is_empty() {
            pw.push_int_array(5, &self.mask)?;
        }
        if !self.anchors_scale.is_empty() {
            pw.push_float_array(6, &self.anchors_scale)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_output_variance_defaults() {
        let op = DetectionOutput::default();
        let mut out = Vec::new();
        op.save_param(&mut ParamWriter::new(&mut out)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_yolov3_arrays() {
        let mut pd = ParamDict::new();
        pd.parse_token("-23304=2,10.000000,14.000000", 1).unwrap();
        pd.parse_token("-23305=2,3,4", 1).unwrap();
        let mut op = Yolov3DetectionOutput::default();
        op.load_param(&pd);
        assert_eq!(op.biases, vec![10.0, 14.0]);
        assert_eq!(op.mask, vec![3, 4]);
    }
}
