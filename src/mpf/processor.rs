// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::mpf::{
    MPF_HEADER_SIZE, MpfIndex, detect_space, make_mpf_segment, mpf_payload, parse_mpf_tree,
};
use crate::tiff::{Directory, TagSpace};
use crate::util::tracing_wrappers::*;

/// Distance from an APP2 marker to the byte following the MPF header: marker, length field and
/// MPF header.
const APP2_TO_MPF_OFFSET: u64 = 8;

/// State kept by [`MpfProcessor::RewriteIndex`] for the final rewrite of the index segment.
#[derive(Clone, Debug)]
pub struct IndexRewrite {
    /// Decoded MPF tree, including the attribute directory of the first image.
    pub tree: Directory,
    /// Index as read from the input file.
    pub index: MpfIndex,
    /// Output position of the APP2 marker of the MPF segment.
    pub write_pos: u64,
    /// Size of the MPF segment data written at `write_pos`.
    pub reserved_len: usize,
}

/// Handlers for APP2 segments that may contain MPF data.
#[derive(Clone, Debug, Default)]
pub enum MpfProcessor {
    /// Treats every segment as non-MPF.
    #[default]
    Ignore,
    /// Only checks for the presence of an MPF segment.
    Check,
    /// Reads the image positions from the MPF index of the first image in a file.
    ReadIndex { index: Option<MpfIndex> },
    /// Decodes the MPF index of the first image and reencodes it unchanged, recording where it's
    /// written. The segment can later be rewritten with new image positions and the same size.
    RewriteIndex { rewrite: Option<IndexRewrite> },
    /// Decodes and reencodes the MPF attributes of an image other than the first.
    RewriteAttributes,
}

/// Result of passing an APP2 segment through an [`MpfProcessor`].
#[derive(Debug)]
pub struct Processed<'a> {
    pub is_mpf: bool,
    /// Segment data to write in place of the original.
    pub data: Cow<'a, [u8]>,
}

impl MpfProcessor {
    /// Processes the data of an APP2 segment.
    ///
    /// `input_end` is the input position one byte past the end of `seg`. `output_start` is the
    /// output position at which the segment's marker will be written, if there's an output.
    pub fn process_app2<'a>(
        &mut self,
        seg: &'a [u8],
        input_end: u64,
        output_start: Option<u64>,
    ) -> Result<Processed<'a>> {
        let unchanged = |is_mpf| Processed {
            is_mpf,
            data: Cow::Borrowed(seg),
        };
        if matches!(self, MpfProcessor::Ignore) {
            return Ok(unchanged(false));
        }
        let Some(payload) = mpf_payload(seg) else {
            return Ok(unchanged(false));
        };
        match self {
            MpfProcessor::Ignore | MpfProcessor::Check => Ok(unchanged(true)),
            MpfProcessor::ReadIndex { index } => {
                if index.is_some() {
                    return Err(Error::DuplicateMpfIndex);
                }
                let tree = parse_tree(payload, TagSpace::MpfIndex)?;
                let offset = input_mpf_offset(seg, input_end)?;
                *index = Some(MpfIndex::from_directory(&tree, offset)?);
                Ok(unchanged(true))
            }
            MpfProcessor::RewriteIndex { rewrite } => {
                if rewrite.is_some() {
                    return Err(Error::DuplicateMpfIndex);
                }
                let write_pos = output_start.ok_or(Error::OutputPositionRequired)?;
                let tree = parse_tree(payload, TagSpace::MpfIndex)?;
                let offset = input_mpf_offset(seg, input_end)?;
                let index = MpfIndex::from_directory(&tree, offset)?;
                let data = make_mpf_segment(&tree);
                debug!(write_pos, len = data.len(), "reserved MPF index segment");
                *rewrite = Some(IndexRewrite {
                    tree,
                    index,
                    write_pos,
                    reserved_len: data.len(),
                });
                Ok(Processed {
                    is_mpf: true,
                    data: Cow::Owned(data),
                })
            }
            MpfProcessor::RewriteAttributes => {
                let tree = parse_tree(payload, TagSpace::MpfAttribute)?;
                Ok(Processed {
                    is_mpf: true,
                    data: Cow::Owned(make_mpf_segment(&tree)),
                })
            }
        }
    }

    /// The index found by [`MpfProcessor::ReadIndex`] or [`MpfProcessor::RewriteIndex`].
    pub fn index(&self) -> Option<&MpfIndex> {
        match self {
            MpfProcessor::ReadIndex { index } => index.as_ref(),
            MpfProcessor::RewriteIndex { rewrite } => rewrite.as_ref().map(|r| &r.index),
            _ => None,
        }
    }
}

fn parse_tree(payload: &[u8], expected: TagSpace) -> Result<Directory> {
    let tree = parse_mpf_tree(payload, expected)?;
    let found = detect_space(&tree);
    if found != expected {
        return Err(Error::UnexpectedTagSpace { expected, found });
    }
    Ok(tree)
}

// File position of the byte following the MPF header in the input, given the position just
// past the segment data.
fn input_mpf_offset(seg: &[u8], input_end: u64) -> Result<u32> {
    let offset = input_end
        .checked_sub((seg.len() - MPF_HEADER_SIZE) as u64)
        .ok_or(Error::OffsetOverflow)?;
    u32::try_from(offset).map_err(|_| Error::OffsetOverflow)
}

/// File position of the byte following the MPF header in the output, for an APP2 marker written
/// at `write_pos`.
pub fn output_mpf_offset(write_pos: u64) -> Result<u32> {
    u32::try_from(write_pos + APP2_TO_MPF_OFFSET).map_err(|_| Error::OffsetOverflow)
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::tiff::Endian;
    use crate::util::test::{mpf_attribute_directory, mpf_index_directory};

    fn index_segment() -> Vec<u8> {
        make_mpf_segment(&mpf_index_directory(
            Endian::Big,
            &[(0, 3000), (2000, 500)],
        ))
    }

    #[test]
    fn ignore_and_check() {
        let seg = index_segment();
        let processed = MpfProcessor::Ignore.process_app2(&seg, 100, None).unwrap();
        assert!(!processed.is_mpf);
        let processed = MpfProcessor::Check.process_app2(&seg, 100, None).unwrap();
        assert!(processed.is_mpf);
        assert!(matches!(processed.data, Cow::Borrowed(_)));
        let processed = MpfProcessor::Check
            .process_app2(b"ICC_PROFILE\0", 100, None)
            .unwrap();
        assert!(!processed.is_mpf);
    }

    #[test]
    fn read_index() {
        let seg = index_segment();
        let mut processor = MpfProcessor::ReadIndex { index: None };
        // Segment data ends at 200, so the MPF header ends at 200 - len + 4.
        let input_end = 200;
        let processed = processor.process_app2(&seg, input_end, None).unwrap();
        assert!(processed.is_mpf);
        let base = (input_end - seg.len() as u64 + 4) as u32;
        let index = processor.index().unwrap();
        assert_eq!(index.offset, base);
        assert_eq!(index.image_offsets, [0, 2000 + base]);
        assert_eq!(index.image_lengths, [3000, 500]);
    }

    #[test]
    fn rewrite_index_reserves_segment() {
        let seg = index_segment();
        let mut processor = MpfProcessor::RewriteIndex { rewrite: None };
        let processed = processor.process_app2(&seg, 200, Some(20)).unwrap();
        assert!(processed.is_mpf);
        assert_eq!(processed.data.as_ref(), seg.as_slice());
        let MpfProcessor::RewriteIndex {
            rewrite: Some(rewrite),
        } = &processor
        else {
            panic!("no rewrite state");
        };
        assert_eq!(rewrite.write_pos, 20);
        assert_eq!(rewrite.reserved_len, seg.len());
        assert_eq!(output_mpf_offset(rewrite.write_pos).unwrap(), 28);
    }

    #[test]
    fn rewrite_index_needs_output() {
        let seg = index_segment();
        let mut processor = MpfProcessor::RewriteIndex { rewrite: None };
        assert!(matches!(
            processor.process_app2(&seg, 200, None),
            Err(Error::OutputPositionRequired)
        ));
    }

    #[test]
    fn second_index_segment() {
        let seg = index_segment();
        let mut processor = MpfProcessor::RewriteIndex { rewrite: None };
        processor.process_app2(&seg, 200, Some(20)).unwrap();
        let err = processor.process_app2(&seg, 400, Some(220)).unwrap_err();
        assert!(matches!(err, Error::DuplicateMpfIndex));
        assert!(err.is_mpf());
        // The first segment stays the one to rewrite.
        let MpfProcessor::RewriteIndex {
            rewrite: Some(rewrite),
        } = &processor
        else {
            panic!("no rewrite state");
        };
        assert_eq!(rewrite.write_pos, 20);

        let mut processor = MpfProcessor::ReadIndex { index: None };
        processor.process_app2(&seg, 200, None).unwrap();
        assert!(matches!(
            processor.process_app2(&seg, 400, None),
            Err(Error::DuplicateMpfIndex)
        ));
    }

    #[test]
    fn rewrite_attributes() {
        let seg = make_mpf_segment(&mpf_attribute_directory(Endian::Little, 2));
        let processed = MpfProcessor::RewriteAttributes
            .process_app2(&seg, 500, Some(50))
            .unwrap();
        assert!(processed.is_mpf);
        assert_eq!(processed.data.as_ref(), seg.as_slice());
    }

    #[test]
    fn wrong_space() {
        let index = index_segment();
        let attributes = make_mpf_segment(&mpf_attribute_directory(Endian::Big, 2));
        assert!(matches!(
            MpfProcessor::ReadIndex { index: None }.process_app2(&attributes, 500, None),
            Err(Error::UnexpectedTagSpace {
                expected: TagSpace::MpfIndex,
                found: TagSpace::MpfAttribute
            })
        ));
        assert!(matches!(
            MpfProcessor::RewriteAttributes.process_app2(&index, 500, Some(0)),
            Err(Error::UnexpectedTagSpace {
                expected: TagSpace::MpfAttribute,
                found: TagSpace::MpfIndex
            })
        ));
    }

    #[test]
    fn bad_index_is_mpf_error() {
        let seg = make_mpf_segment(&mpf_index_directory(Endian::Big, &[]));
        let err = MpfProcessor::ReadIndex { index: None }
            .process_app2(&seg, 200, None)
            .unwrap_err();
        assert!(err.is_mpf());
        assert!(!err.is_format());
    }
}
