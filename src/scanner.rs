// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{Read, Seek};

use crate::codec::{MAX_SEGMENT_DATA, read_data, read_header, read_marker};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::segment::Segment;
use crate::stuffing::read_image_data;
use crate::util::tracing_wrappers::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    AwaitingMarker,
    // After an SOS segment or RST marker.
    AwaitingScanData,
    // After EOI.
    Finished,
}

/// Reads JPEG markers, data segments and scan data from a seekable stream, one at a time.
///
/// Markers and lengths are read a byte or two at a time, so an unbuffered file is best wrapped in
/// a `BufReader`. The scanner seeks back over the marker that ends each chunk of scan data, which
/// `BufReader` supports.
pub struct Scanner<R> {
    reader: R,
    buf: Vec<u8>,
    state: State,
}

impl<R: Read + Seek> Scanner<R> {
    /// Creates a scanner and reads the JPEG header.
    pub fn new(mut reader: R) -> Result<Scanner<R>> {
        read_header(&mut reader)?;
        Ok(Scanner {
            reader,
            buf: Vec::with_capacity(MAX_SEGMENT_DATA),
            state: State::AwaitingMarker,
        })
    }

    /// Reads the next marker and its data.
    ///
    /// Scan data is returned with [`Marker::SCAN_DATA`]; it may be empty, e.g. between two
    /// RST markers. Markers without a data segment (RSTn, EOI, TEM) are returned with `None`.
    /// The returned data borrows the scanner and is overwritten by the next call.
    ///
    /// Calling `scan` again after EOI has been returned fails with [`Error::PastEndOfImage`].
    pub fn scan(&mut self) -> Result<Segment<'_>> {
        match self.state {
            State::Finished => Err(Error::PastEndOfImage),
            State::AwaitingScanData => {
                read_image_data(&mut self.reader, &mut self.buf)?;
                self.state = State::AwaitingMarker;
                Ok(Segment {
                    marker: Marker::SCAN_DATA,
                    data: Some(self.buf.as_slice()),
                })
            }
            State::AwaitingMarker => {
                let marker = read_marker(&mut self.reader)?;
                if marker.starts_scan_data() {
                    self.state = State::AwaitingScanData;
                } else if marker == Marker::EOI {
                    self.state = State::Finished;
                }
                if !marker.has_payload() {
                    trace!(%marker, "scanned marker");
                    return Ok(Segment { marker, data: None });
                }
                let data = read_data(&mut self.reader, &mut self.buf)?;
                trace!(%marker, len = data.len(), "scanned segment");
                Ok(Segment {
                    marker,
                    data: Some(data),
                })
            }
        }
    }

    /// Whether EOI has been returned.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Current position of the underlying stream.
    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Gives access to the underlying stream. Moving it while scan data is expected will desync
    /// the scanner.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
