// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

use crate::tiff::TagSpace;

#[derive(Error, Debug)]
pub enum Error {
    // Marker and segment format errors.
    #[error("SOI marker not found")]
    MissingStartMarker,
    #[error("0xFF expected in marker, found {0:#04x}")]
    ExpectedMarkerPrefix(u8),
    #[error("Invalid marker 0")]
    InvalidMarkerZero,
    #[error("Stream truncated")]
    Truncated,
    #[error("Invalid segment length {0}, minimum is 2")]
    InvalidLength(u16),
    #[error("Segment data is too long ({0}), max 2^16 - 3 (65533)")]
    SegmentTooLarge(usize),
    #[error("Scan called after EOI")]
    PastEndOfImage,
    #[error("Marker {0:#04x} can't be written")]
    UnwritableMarker(u8),
    #[error("Scan data written without data")]
    MissingScanData,
    // Tag directory errors.
    #[error("Invalid TIFF header")]
    InvalidTiffHeader,
    #[error("Directory data out of bounds at offset {0}")]
    DirectoryOutOfBounds(usize),
    #[error("Invalid field type {1} for tag {0:#06x}")]
    InvalidFieldType(u16, u16),
    #[error("Directory chain loops back to offset {0}")]
    DirectoryLoop(usize),
    // MPF errors.
    #[error("MPF image count is 0")]
    ZeroImageCount,
    #[error("MPF entry table has {len} bytes, expected 16 for each of {count} images")]
    EntryTableTooShort { count: u32, len: usize },
    #[error("Invalid MPF offset for image {0}")]
    InvalidMpfOffsetPattern(usize),
    #[error("MPF offset overflow")]
    OffsetOverflow,
    #[error("MPF directory is in the {found:?} space, expected {expected:?}")]
    UnexpectedTagSpace { expected: TagSpace, found: TagSpace },
    #[error("Rewritten MPF segment is {actual} bytes, but {reserved} bytes were reserved")]
    BackpatchSizeMismatch { reserved: usize, actual: usize },
    #[error("Image has more than one MPF index segment")]
    DuplicateMpfIndex,
    #[error("MPF index rewrite needs the output stream position")]
    OutputPositionRequired,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors in the marker and segment structure of the stream. These abort any traversal.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::MissingStartMarker
                | Error::ExpectedMarkerPrefix(_)
                | Error::InvalidMarkerZero
                | Error::Truncated
                | Error::InvalidLength(_)
                | Error::SegmentTooLarge(_)
                | Error::PastEndOfImage
                | Error::UnwritableMarker(_)
                | Error::MissingScanData
        )
    }

    /// Errors in MPF data, including its tag directory. A traversal that doesn't look into MPF
    /// segments never sees these.
    pub fn is_mpf(&self) -> bool {
        matches!(
            self,
            Error::InvalidTiffHeader
                | Error::DirectoryOutOfBounds(_)
                | Error::InvalidFieldType(..)
                | Error::DirectoryLoop(_)
                | Error::ZeroImageCount
                | Error::EntryTableTooShort { .. }
                | Error::InvalidMpfOffsetPattern(_)
                | Error::OffsetOverflow
                | Error::UnexpectedTagSpace { .. }
                | Error::BackpatchSizeMismatch { .. }
                | Error::DuplicateMpfIndex
                | Error::OutputPositionRequired
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps an unexpected end of stream to [`Error::Truncated`], keeping other I/O errors as they are.
pub(crate) fn eof_as_truncated(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Truncated
    } else {
        Error::Io(err)
    }
}
