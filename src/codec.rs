// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reading and writing of the JPEG header, markers and length-prefixed data segments.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result, eof_as_truncated};
use crate::marker::Marker;

/// Size of a JPEG file header (the SOI marker).
pub const HEADER_SIZE: usize = 2;

/// Largest data segment that can be written. The length field is 16 bits and counts itself.
pub const MAX_SEGMENT_DATA: usize = (1 << 16) - 3;

/// Indicates if `buf` starts with a JPEG header.
pub fn is_jpeg_header(buf: &[u8]) -> bool {
    buf.len() >= HEADER_SIZE && buf[0] == 0xFF && buf[1] == Marker::SOI.0
}

/// Reads the JPEG header (SOI marker). Fill bytes aren't allowed.
pub fn read_header<R: Read>(reader: &mut R) -> Result<()> {
    let mut buf = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::MissingStartMarker);
        }
        Err(err) => return Err(err.into()),
    }
    if !is_jpeg_header(&buf) {
        return Err(Error::MissingStartMarker);
    }
    Ok(())
}

/// Writes the JPEG header.
pub fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    write_marker(writer, Marker::SOI)
}

/// Reads a marker: 0xFF followed by the marker code. Any 0xFF fill bytes in between are
/// discarded.
pub fn read_marker<R: Read>(reader: &mut R) -> Result<Marker> {
    let prefix = reader.read_u8().map_err(eof_as_truncated)?;
    if prefix != 0xFF {
        return Err(Error::ExpectedMarkerPrefix(prefix));
    }
    let mut code = reader.read_u8().map_err(eof_as_truncated)?;
    while code == 0xFF {
        code = reader.read_u8().map_err(eof_as_truncated)?;
    }
    if code == 0 {
        return Err(Error::InvalidMarkerZero);
    }
    Ok(Marker(code))
}

/// Writes a marker: 0xFF followed by the marker code.
pub fn write_marker<W: Write>(writer: &mut W, marker: Marker) -> Result<()> {
    writer.write_all(&[0xFF, marker.0])?;
    Ok(())
}

/// Reads a data segment following a marker into `buf`, replacing its contents, and returns the
/// segment data.
pub fn read_data<'a, R: Read>(reader: &mut R, buf: &'a mut Vec<u8>) -> Result<&'a [u8]> {
    let length = reader.read_u16::<BigEndian>().map_err(eof_as_truncated)?;
    if length < 2 {
        return Err(Error::InvalidLength(length));
    }
    let length = length as usize - 2;
    buf.clear();
    buf.resize(length, 0);
    reader.read_exact(buf).map_err(eof_as_truncated)?;
    Ok(&buf[..])
}

/// Writes a data segment: a 2-byte length that includes itself, then `data`.
pub fn write_data<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    if data.len() > MAX_SEGMENT_DATA {
        return Err(Error::SegmentTooLarge(data.len()));
    }
    writer.write_u16::<BigEndian>(data.len() as u16 + 2)?;
    writer.write_all(data)?;
    Ok(())
}
