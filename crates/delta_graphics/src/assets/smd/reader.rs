//! Little-endian primitive reader over a seekable stream
//!
//! Every read is fixed-size; a short read surfaces as
//! [`SmdError::UnexpectedEof`] naming what was being read.

use std::io::{Read, Seek, SeekFrom};

use super::{SmdError, SmdResult, NAME_LENGTH};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Binary reader for SMD model files
pub struct SmdReader<R> {
    inner: R,
}

impl<R: Read + Seek> SmdReader<R> {
    /// Wrap a stream positioned at the start of the file
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Current byte offset
    pub fn position(&mut self) -> SmdResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Jump to an absolute byte offset
    pub fn seek_to(&mut self, offset: u64) -> SmdResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Skip bytes that carry no data for this crate
    pub fn skip(&mut self, bytes: i64) -> SmdResult<()> {
        self.inner.seek(SeekFrom::Current(bytes))?;
        Ok(())
    }

    /// Fill `buf` completely or fail with the given context
    pub fn read_exact(&mut self, buf: &mut [u8], context: &'static str) -> SmdResult<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => SmdError::UnexpectedEof { context },
            _ => SmdError::Io(e),
        })
    }

    fn read_array<const N: usize>(&mut self, context: &'static str) -> SmdResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf, context)?;
        Ok(buf)
    }

    /// Read a single byte
    pub fn read_u8(&mut self, context: &'static str) -> SmdResult<u8> {
        Ok(self.read_array::<1>(context)?[0])
    }

    /// Read a little-endian `u16`
    pub fn read_u16(&mut self, context: &'static str) -> SmdResult<u16> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    /// Read a little-endian `i32`
    pub fn read_i32(&mut self, context: &'static str) -> SmdResult<i32> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self, context: &'static str) -> SmdResult<u32> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self, context: &'static str) -> SmdResult<f32> {
        Ok(f32::from_le_bytes(self.read_array(context)?))
    }

    /// Read a 4-byte boolean (non-zero is true)
    pub fn read_bool32(&mut self, context: &'static str) -> SmdResult<bool> {
        Ok(self.read_i32(context)? != 0)
    }

    /// Read one fixed-point `i32` as a float
    pub fn read_fixed(&mut self, context: &'static str) -> SmdResult<f32> {
        Ok(utils::fixed_to_float(self.read_i32(context)?))
    }

    /// Read three `i32`s
    pub fn read_i32x3(&mut self, context: &'static str) -> SmdResult<[i32; 3]> {
        Ok([self.read_i32(context)?, self.read_i32(context)?, self.read_i32(context)?])
    }

    /// Read three `f32`s as a vector
    pub fn read_vec3(&mut self, context: &'static str) -> SmdResult<Vec3> {
        Ok(Vec3::new(self.read_f32(context)?, self.read_f32(context)?, self.read_f32(context)?))
    }

    /// Read three fixed-point `i32`s as a vector
    pub fn read_fixed_vec3(&mut self, context: &'static str) -> SmdResult<Vec3> {
        Ok(utils::fixed_to_vec3(self.read_i32x3(context)?))
    }

    /// Read a fixed-width, NUL-padded name
    pub fn read_name(&mut self, context: &'static str) -> SmdResult<String> {
        let buf: [u8; NAME_LENGTH] = self.read_array(context)?;
        Ok(decode_name(&buf))
    }

    /// Read a row-major matrix of fixed-point `i32`s
    pub fn read_fixed_matrix(&mut self, context: &'static str) -> SmdResult<Mat4> {
        let mut values = [0.0f32; 16];
        for value in &mut values {
            *value = utils::fixed_to_float(self.read_i32(context)?);
        }
        Ok(Mat4::from_row_vector_layout(&values))
    }

    /// Read a row-major matrix of `f32`s
    pub fn read_float_matrix(&mut self, context: &'static str) -> SmdResult<Mat4> {
        let mut values = [0.0f32; 16];
        for value in &mut values {
            *value = self.read_f32(context)?;
        }
        Ok(Mat4::from_row_vector_layout(&values))
    }

    /// Read a length-prefixed byte block
    pub fn read_block(&mut self, context: &'static str) -> SmdResult<Vec<u8>> {
        let length = self.read_i32(context)?;
        let length = usize::try_from(length)
            .map_err(|_| SmdError::InvalidFormat(format!("negative {context} length {length}")))?;
        let mut block = vec![0u8; length];
        self.read_exact(&mut block, context)?;
        Ok(block)
    }
}

/// Decode a NUL-terminated name, replacing invalid UTF-8
pub fn decode_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
