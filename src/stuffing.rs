// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Byte stuffing of entropy-coded scan data: a literal 0xFF is stored as 0xFF 0x00, and any other
//! byte following 0xFF starts a marker that terminates the scan data.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::util::tracing_wrappers::*;

/// Number of bytes requested from the reader at a time when reading scan data.
pub const IMAGE_DATA_BLOCK_SIZE: usize = 10000;

/// Reads scan data up to the next marker into `out`, replacing its contents and removing the
/// stuffed zero bytes.
///
/// Reading is done in blocks, so the reader doesn't need to be buffered. On return, the reader
/// is positioned at the 0xFF that starts the terminating marker.
pub fn read_image_data<R: Read + Seek>(reader: &mut R, out: &mut Vec<u8>) -> Result<()> {
    out.clear();
    let mut block = vec![0u8; IMAGE_DATA_BLOCK_SIZE];
    // Set when the previous block ended in 0xFF, whose successor is in this block.
    let mut pending_ff = false;
    loop {
        let count = read_block(reader, &mut block)?;
        if count == 0 {
            return Err(Error::Truncated);
        }
        let chunk = &block[..count];
        let mut pos = 0;
        if pending_ff {
            pending_ff = false;
            if chunk[0] != 0 {
                reader.seek(SeekFrom::Current(-(count as i64) - 1))?;
                trace!(len = out.len(), "scan data ends at block boundary");
                return Ok(());
            }
            out.push(0xFF);
            pos = 1;
        }
        while pos < count {
            let Some(ff) = chunk[pos..].iter().position(|&b| b == 0xFF) else {
                out.extend_from_slice(&chunk[pos..]);
                break;
            };
            let ff = pos + ff;
            out.extend_from_slice(&chunk[pos..ff]);
            if ff + 1 == count {
                pending_ff = true;
                break;
            }
            if chunk[ff + 1] != 0 {
                // Found a marker; leave the reader at its first byte.
                reader.seek(SeekFrom::Current(ff as i64 - count as i64))?;
                trace!(len = out.len(), "read scan data");
                return Ok(());
            }
            out.push(0xFF);
            pos = ff + 2;
        }
    }
}

fn read_block<R: Read>(reader: &mut R, block: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(block) {
            Ok(count) => return Ok(count),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Writes a block of scan data, stuffing a zero byte after each 0xFF.
pub fn write_image_data<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    let mut rest = data;
    while let Some(ff) = rest.iter().position(|&b| b == 0xFF) {
        writer.write_all(&rest[..=ff])?;
        writer.write_all(&[0])?;
        rest = &rest[ff + 1..];
    }
    writer.write_all(rest)?;
    Ok(())
}
