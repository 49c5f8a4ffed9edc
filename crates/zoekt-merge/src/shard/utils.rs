// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounds-checked cursor reads over a mapped shard. Every helper advances
//! `off` past what it read and reports truncation instead of panicking.

use super::DecodeError;

pub(crate) fn read_bytes_at<'a>(
    buf: &'a [u8],
    off: &mut usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DecodeError> {
    let end = off
        .checked_add(len)
        .filter(|&e| e <= buf.len())
        .ok_or(DecodeError::Truncated { what, off: *off })?;
    let out = &buf[*off..end];
    *off = end;
    Ok(out)
}

fn read_array_at<const N: usize>(
    buf: &[u8],
    off: &mut usize,
    what: &'static str,
) -> Result<[u8; N], DecodeError> {
    let at = *off;
    read_bytes_at(buf, off, N, what)?
        .try_into()
        .map_err(|_| DecodeError::Truncated { what, off: at })
}

pub(crate) fn read_u16_at(
    buf: &[u8],
    off: &mut usize,
    what: &'static str,
) -> Result<u16, DecodeError> {
    read_array_at(buf, off, what).map(u16::from_le_bytes)
}

pub(crate) fn read_u32_at(
    buf: &[u8],
    off: &mut usize,
    what: &'static str,
) -> Result<u32, DecodeError> {
    read_array_at(buf, off, what).map(u32::from_le_bytes)
}

pub(crate) fn read_u64_at(
    buf: &[u8],
    off: &mut usize,
    what: &'static str,
) -> Result<u64, DecodeError> {
    read_array_at(buf, off, what).map(u64::from_le_bytes)
}

pub(crate) fn read_tri_at(
    buf: &[u8],
    off: &mut usize,
    what: &'static str,
) -> Result<[u8; 3], DecodeError> {
    read_array_at(buf, off, what)
}

/// Read a `[len: u16][utf8]` string.
pub(crate) fn read_str_u16_at<'a>(
    buf: &'a [u8],
    off: &mut usize,
    what: &'static str,
) -> Result<&'a str, DecodeError> {
    let len = read_u16_at(buf, off, what)? as usize;
    let at = *off;
    let bytes = read_bytes_at(buf, off, len, what)?;
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { what, off: at })
}

/// Read a u32 varint encoded in LEB128 style.
pub(crate) fn read_var_u32_at(buf: &[u8], off: &mut usize) -> Result<u32, DecodeError> {
    let mut shift = 0u32;
    let mut out: u32 = 0;
    loop {
        let Some(&b) = buf.get(*off) else {
            return Err(DecodeError::Truncated {
                what: "varint",
                off: *off,
            });
        };
        *off += 1;
        out |= ((b & 0x7F) as u32) << shift;
        if (b & 0x80) == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift >= 35 {
            return Err(DecodeError::Corrupt(format!("varint too long (off={})", *off)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_reads_report_offset() {
        let buf = [1u8, 0, 2];
        let mut off = 0;
        assert_eq!(read_u16_at(&buf, &mut off, "a").unwrap(), 1);
        let err = read_u32_at(&buf, &mut off, "b").unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { what: "b", off: 2 }));
        // a failed read does not advance the cursor
        assert_eq!(off, 2);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let buf = [2u8, 0, 0xFF, 0xFE];
        let mut off = 0;
        let err = read_str_u16_at(&buf, &mut off, "name").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidUtf8 { what: "name", off: 2 }));
    }

    #[test]
    fn varint_rejects_overlong_and_eof() {
        let mut off = 0;
        assert_eq!(read_var_u32_at(&[0xAC, 0x02], &mut off).unwrap(), 300);
        let mut off = 0;
        assert!(read_var_u32_at(&[0x80, 0x80], &mut off).is_err());
        let mut off = 0;
        assert!(read_var_u32_at(&[0xFF; 6], &mut off).is_err());
    }
}
