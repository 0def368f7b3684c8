// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binary weight stream codec.
//!
//! The weights file is a flat sequence of tensor records in layer order.
//! A layer's first weight is *tagged*: a 4-byte little-endian storage tag
//! precedes the payload (`0` for raw fp32, [`FP16_MAGIC`] for fp16).
//! Subsequent weights of the same layer are untagged raw fp32. Every record
//! is zero-padded so its total on-disk size is a multiple of four bytes;
//! raw fp32 records are always aligned, so in practice only fp16 payloads
//! with an odd element count carry padding.

use crate::ModelError;
use std::io::{self, Read, Write};
use tensor_core::{f16, DType, Tensor};

/// Storage tag marking an fp16 payload.
pub const FP16_MAGIC: u32 = 0x01306B47;

/// Reads tensor records from a weight stream, widening fp16 to f32.
pub struct WeightReader<R: Read> {
    inner: R,
    offset: u64,
}

impl<R: Read> WeightReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes consumed so far; used in truncation diagnostics.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads a tagged record of `count` elements.
    pub fn read_tagged(&mut self, count: usize) -> Result<Tensor, ModelError> {
        let tag_offset = self.offset;
        let b = self.read_bytes(4)?;
        let tag = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        match tag {
            0 => self.read_raw(count),
            FP16_MAGIC => {
                let payload = self.read_bytes(count * 2)?;
                let halves: Vec<u16> = payload
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                self.skip_record_padding(4 + count * 2)?;
                Ok(Tensor::from_values(f16::cast_f16_to_f32(&halves)))
            }
            other => Err(ModelError::UnknownWeightTag {
                tag: other,
                offset: tag_offset,
            }),
        }
    }

    /// Reads an untagged raw fp32 record of `count` elements.
    pub fn read_raw(&mut self, count: usize) -> Result<Tensor, ModelError> {
        let payload = self.read_bytes(count * 4)?;
        let values: Vec<f32> = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Tensor::from_values(values))
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ModelError> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ModelError::TruncatedWeights {
                    wanted: n,
                    offset: self.offset,
                }
            } else {
                ModelError::Io(e)
            }
        })?;
        self.offset += n as u64;
        Ok(buf)
    }

    fn skip_record_padding(&mut self, record_bytes: usize) -> Result<(), ModelError> {
        let pad = record_bytes.next_multiple_of(4) - record_bytes;
        if pad > 0 {
            self.read_bytes(pad)?;
        }
        Ok(())
    }
}

/// Writes tensor records to a weight stream.
///
/// The storage type chosen at construction applies to tagged records only;
/// untagged records are always raw fp32, mirroring the reader.
pub struct WeightWriter<W: Write> {
    inner: W,
    storage: DType,
}

impl<W: Write> WeightWriter<W> {
    pub fn new(inner: W, storage: DType) -> Self {
        Self { inner, storage }
    }

    /// Writes a tagged record: storage tag, flattened payload, padding.
    pub fn write_tagged(&mut self, data: &Tensor) -> io::Result<()> {
        match self.storage {
            DType::F16 => {
                self.inner.write_all(&FP16_MAGIC.to_le_bytes())?;
                let halves = f16::cast_f32_to_f16(data.as_slice());
                for h in &halves {
                    self.inner.write_all(&h.to_le_bytes())?;
                }
                self.write_record_padding(4 + halves.len() * 2)
            }
            DType::F32 => {
                self.inner.write_all(&0u32.to_le_bytes())?;
                for v in data.as_slice() {
                    self.inner.write_all(&v.to_le_bytes())?;
                }
                self.write_record_padding(4 + data.total() * 4)
            }
        }
    }

    /// Writes an untagged raw fp32 record. An empty tensor (an absent
    /// optional weight) occupies no bytes.
    pub fn write_raw(&mut self, data: &Tensor) -> io::Result<()> {
        for v in data.as_slice() {
            self.inner.write_all(&v.to_le_bytes())?;
        }
        self.write_record_padding(data.total() * 4)
    }

    fn write_record_padding(&mut self, record_bytes: usize) -> io::Result<()> {
        const ZEROS: [u8; 4] = [0; 4];
        let pad = record_bytes.next_multiple_of(4) - record_bytes;
        self.inner.write_all(&ZEROS[..pad])
    }
}
