// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{Read, Seek, Write};

use crate::dumper::Dumper;
use crate::error::Result;
use crate::marker::Marker;
use crate::scanner::Scanner;

/// A marker and its segment data, as returned by [`Scanner::scan`].
///
/// The data borrows the scanner's buffer, which is reused on the next call. Use
/// [`Segment::to_owned_segment`] to keep it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub marker: Marker,
    /// `None` for markers without a data segment (RSTn, EOI and TEM).
    pub data: Option<&'a [u8]>,
}

impl Segment<'_> {
    pub fn to_owned_segment(&self) -> OwnedSegment {
        OwnedSegment {
            marker: self.marker,
            data: self.data.map(<[u8]>::to_vec),
        }
    }
}

/// A marker and its segment data, independent of the scanner that read it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedSegment {
    pub marker: Marker,
    pub data: Option<Vec<u8>>,
}

impl OwnedSegment {
    pub fn as_segment(&self) -> Segment<'_> {
        Segment {
            marker: self.marker,
            data: self.data.as_deref(),
        }
    }
}

/// Reads a JPEG stream up to and including the SOS segment.
pub fn read_segments<R: Read + Seek>(reader: R) -> Result<Vec<OwnedSegment>> {
    let mut scanner = Scanner::new(reader)?;
    let mut segments = Vec::with_capacity(20);
    loop {
        let segment = scanner.scan()?;
        let marker = segment.marker;
        segments.push(segment.to_owned_segment());
        if marker == Marker::SOS {
            return Ok(segments);
        }
    }
}

/// Writes a header followed by the given markers and segments.
pub fn write_segments<W: Write>(writer: W, segments: &[OwnedSegment]) -> Result<W> {
    let mut dumper = Dumper::new(writer)?;
    for segment in segments {
        dumper.dump_segment(segment.as_segment())?;
    }
    Ok(dumper.into_inner())
}
