// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{Seek, Write};

use crate::codec::{write_data, write_header, write_marker};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::segment::Segment;
use crate::stuffing::write_image_data;

/// Writes JPEG markers, data segments and scan data to a stream. The counterpart of
/// [`Scanner`](crate::scanner::Scanner).
pub struct Dumper<W> {
    writer: W,
}

impl<W: Write> Dumper<W> {
    /// Creates a dumper and writes the JPEG header.
    pub fn new(mut writer: W) -> Result<Dumper<W>> {
        write_header(&mut writer)?;
        Ok(Dumper { writer })
    }

    /// Writes a marker and its data segment, if any. With [`Marker::SCAN_DATA`], `data` is
    /// written as stuffed scan data with no marker.
    ///
    /// Fails with [`Error::UnwritableMarker`] for 0xFF, which would read back as a fill byte, and
    /// with [`Error::MissingScanData`] for [`Marker::SCAN_DATA`] without data.
    pub fn dump(&mut self, marker: Marker, data: Option<&[u8]>) -> Result<()> {
        if marker.is_scan_data() {
            let data = data.ok_or(Error::MissingScanData)?;
            return write_image_data(&mut self.writer, data);
        }
        if marker.0 == 0xFF {
            return Err(Error::UnwritableMarker(marker.0));
        }
        write_marker(&mut self.writer, marker)?;
        if let Some(data) = data {
            write_data(&mut self.writer, data)?;
        }
        Ok(())
    }

    pub fn dump_segment(&mut self, segment: Segment<'_>) -> Result<()> {
        self.dump(segment.marker, segment.data)
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Seek> Dumper<W> {
    /// Current position of the underlying stream.
    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }
}
