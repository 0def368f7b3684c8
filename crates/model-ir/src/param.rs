// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sparse integer-keyed layer parameters.
//!
//! Topology lines carry parameters as `key=value` tokens. A non-negative
//! written key is a scalar; a negative key marks the array form, where the
//! real key is `-(written + 23300)` and the value is `count,v0,v1,…`.
//! Whether a token is an int or a float is decided by its spelling: anything
//! containing `.`, `e`, or `E` is a float.
//!
//! [`ParamDict`] is the parsed form a layer's `load_param` reads from, with
//! coercing typed getters that fall back to the kind's schema default.
//! [`ParamWriter`] is the serialising counterpart: a parameter is emitted
//! only when it differs from the reference value it is paired with — the
//! kind's default for ordinary keys, the primary member for `w/h`-style
//! paired keys.

use crate::ModelError;
use std::collections::HashMap;
use std::io::{self, Write};

/// Bias added to a parameter key when it is written in array form.
pub const ARRAY_KEY_BIAS: i32 = 23300;

/// A single parsed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
}

/// Parameters of one layer line, keyed by integer id.
#[derive(Debug, Clone, Default)]
pub struct ParamDict {
    entries: HashMap<i32, ParamValue>,
}

impl ParamDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one `key=value` token into the dictionary.
    ///
    /// `line` is the 1-based topology line number, used for diagnostics.
    pub fn parse_token(&mut self, token: &str, line: usize) -> Result<(), ModelError> {
        let (key, value) = token.split_once('=').ok_or_else(|| ModelError::Parse {
            line,
            detail: format!("expected key=value, got '{token}'"),
        })?;
        let key: i32 = key.parse().map_err(|_| ModelError::Parse {
            line,
            detail: format!("non-integer parameter key '{key}'"),
        })?;

        if key >= 0 {
            self.entries.insert(key, parse_scalar(value, line)?);
            return Ok(());
        }

        // Array form: the written key is -(id + 23300) and the value
        // leads with the element count.
        let id = -key - ARRAY_KEY_BIAS;
        if id < 0 {
            return Err(ModelError::Parse {
                line,
                detail: format!("array key {key} out of range"),
            });
        }
        let mut fields = value.split(',');
        let count: usize = fields
            .next()
            .unwrap_or("")
            .parse()
            .map_err(|_| ModelError::Parse {
                line,
                detail: format!("array parameter {id} has no element count"),
            })?;
        let elems: Vec<&str> = fields.collect();
        if elems.len() != count {
            return Err(ModelError::Parse {
                line,
                detail: format!(
                    "array parameter {id} declares {count} elements, carries {}",
                    elems.len()
                ),
            });
        }
        let value = if elems.iter().any(|e| looks_like_float(e)) {
            let mut vs = Vec::with_capacity(count);
            for e in &elems {
                vs.push(parse_f32(e, line)?);
            }
            ParamValue::FloatArray(vs)
        } else {
            let mut vs = Vec::with_capacity(count);
            for e in &elems {
                vs.push(parse_i32(e, line)?);
            }
            ParamValue::IntArray(vs)
        };
        self.entries.insert(id, value);
        Ok(())
    }

    /// Inserts a value directly (used by tests and graph builders).
    pub fn set(&mut self, id: i32, value: ParamValue) {
        self.entries.insert(id, value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Integer getter; a float value is truncated toward zero.
    pub fn get_int(&self, id: i32, default: i32) -> i32 {
        match self.entries.get(&id) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i32,
            _ => default,
        }
    }

    /// Float getter; an integer value is widened.
    pub fn get_float(&self, id: i32, default: f32) -> f32 {
        match self.entries.get(&id) {
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    /// Float-array getter; absent keys yield an empty vector.
    pub fn get_float_array(&self, id: i32) -> Vec<f32> {
        match self.entries.get(&id) {
            Some(ParamValue::FloatArray(v)) => v.clone(),
            Some(ParamValue::IntArray(v)) => v.iter().map(|&x| x as f32).collect(),
            _ => Vec::new(),
        }
    }

    /// Int-array getter; absent keys yield an empty vector.
    pub fn get_int_array(&self, id: i32) -> Vec<i32> {
        match self.entries.get(&id) {
            Some(ParamValue::IntArray(v)) => v.clone(),
            Some(ParamValue::FloatArray(v)) => v.iter().map(|&x| x as i32).collect(),
            _ => Vec::new(),
        }
    }
}

/// Sparse parameter emission for one layer line.
///
/// Scalar pushes write nothing when the value equals its reference, which
/// is how the topology stays minimal: defaults vanish, and `*_h` keys
/// vanish whenever they equal their `*_w` primary.
pub struct ParamWriter<W: Write> {
    inner: W,
}

impl<W: Write> ParamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Emits ` id=v` when `v != reference`.
    pub fn push_int(&mut self, id: i32, v: i32, reference: i32) -> io::Result<()> {
        if v != reference {
            write!(self.inner, " {id}={v}")?;
        }
        Ok(())
    }

    /// Emits ` id=v` (fixed six-decimal notation) when `v != reference`.
    pub fn push_float(&mut self, id: i32, v: f32, reference: f32) -> io::Result<()> {
        if v != reference {
            write!(self.inner, " {id}={v:.6}")?;
        }
        Ok(())
    }

    /// Emits the array form ` -(id+23300)=count,v0,v1,…`.
    pub fn push_float_array(&mut self, id: i32, values: &[f32]) -> io::Result<()> {
        write!(self.inner, " -{}={}", ARRAY_KEY_BIAS + id, values.len())?;
        for v in values {
            write!(self.inner, ",{v:.6}")?;
        }
        Ok(())
    }

    /// Emits the array form with integer elements.
    pub fn push_int_array(&mut self, id: i32, values: &[i32]) -> io::Result<()> {
        write!(self.inner, " -{}={}", ARRAY_KEY_BIAS + id, values.len())?;
        for v in values {
            write!(self.inner, ",{v}")?;
        }
        Ok(())
    }
}

/// The spelling rule the format uses to distinguish floats from ints.
fn looks_like_float(s: &str) -> bool {
    s.contains(['.', 'e', 'E'])
}

fn parse_scalar(s: &str, line: usize) -> Result<ParamValue, ModelError> {
    if looks_like_float(s) {
        Ok(ParamValue::Float(parse_f32(s, line)?))
    } else {
        Ok(ParamValue::Int(parse_i32(s, line)?))
    }
}

fn parse_i32(s: &str, line: usize) -> Result<i32, ModelError> {
    s.parse().map_err(|_| ModelError::Parse {
        line,
        detail: format!("invalid integer '{s}'"),
    })
}

fn parse_f32(s: &str, line: usize) -> Result<f32, ModelError> {
    s.parse().map_err(|_| ModelError::Parse {
        line,
        detail: format!("invalid float '{s}'"),
    })
}
