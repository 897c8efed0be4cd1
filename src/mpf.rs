// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Multi-Picture Format (CIPA DC-007) support.
//!
//! MPF data is stored in APP2 segments as a TIFF structure following a 4-byte header. The MPF
//! segment of the first image in a file starts with an index giving the offsets and lengths of
//! all images; offsets are relative to the byte following the MPF header.

pub mod processor;

use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::tiff::{Directory, TagSpace};
use crate::util::tracing_wrappers::*;

/// Signature at the start of an MPF APP2 segment.
pub const MPF_HEADER: &[u8; 4] = b"MPF\0";
pub const MPF_HEADER_SIZE: usize = 4;

/// Size of each image's record in the [`ENTRY`] table.
pub const ENTRY_SIZE: usize = 16;

// Tags in the MP Index IFD.
pub const VERSION: u16 = 0xB000;
pub const NUMBER_OF_IMAGES: u16 = 0xB001;
pub const ENTRY: u16 = 0xB002;
pub const IMAGE_UID_LIST: u16 = 0xB003;
pub const TOTAL_FRAMES: u16 = 0xB004;

// Tags in the MP Attribute IFD, in addition to VERSION.
pub const INDIVIDUAL_IMAGE_NUMBER: u16 = 0xB101;
pub const PANORAMA_SCANNING_ORIENTATION: u16 = 0xB201;
pub const PANORAMA_HORIZONTAL_OVERLAP: u16 = 0xB202;
pub const PANORAMA_VERTICAL_OVERLAP: u16 = 0xB203;
pub const BASE_VIEWPOINT_NUMBER: u16 = 0xB204;
pub const CONVERGENCE_ANGLE: u16 = 0xB205;
pub const BASELINE_LENGTH: u16 = 0xB206;
pub const DIVERGENCE_ANGLE: u16 = 0xB207;
pub const HORIZONTAL_AXIS_DISTANCE: u16 = 0xB208;
pub const VERTICAL_AXIS_DISTANCE: u16 = 0xB209;
pub const COLLIMATION_AXIS_DISTANCE: u16 = 0xB20A;
pub const YAW_ANGLE: u16 = 0xB20B;
pub const PITCH_ANGLE: u16 = 0xB20C;
pub const ROLL_ANGLE: u16 = 0xB20D;

/// Name of an MPF tag in the given space.
pub fn tag_name(space: TagSpace, tag: u16) -> Option<&'static str> {
    let name = match (space, tag) {
        (_, VERSION) => "MPFVersion",
        (TagSpace::MpfIndex, NUMBER_OF_IMAGES) => "MPFNumberOfImages",
        (TagSpace::MpfIndex, ENTRY) => "MPFEntry",
        (TagSpace::MpfIndex, IMAGE_UID_LIST) => "MPFImageUIDList",
        (TagSpace::MpfIndex, TOTAL_FRAMES) => "MPFTotalFrames",
        (TagSpace::MpfAttribute, INDIVIDUAL_IMAGE_NUMBER) => "MPFIndividualImageNumber",
        (TagSpace::MpfAttribute, PANORAMA_SCANNING_ORIENTATION) => {
            "MPFPanoramaScanningOrientation"
        }
        (TagSpace::MpfAttribute, PANORAMA_HORIZONTAL_OVERLAP) => "MPFPanoramaHorizontalOverlap",
        (TagSpace::MpfAttribute, PANORAMA_VERTICAL_OVERLAP) => "MPFPanoramaVerticalOverlap",
        (TagSpace::MpfAttribute, BASE_VIEWPOINT_NUMBER) => "MPFBaseViewpointNumber",
        (TagSpace::MpfAttribute, CONVERGENCE_ANGLE) => "MPFConvergenceAngle",
        (TagSpace::MpfAttribute, BASELINE_LENGTH) => "MPFBaselineLength",
        (TagSpace::MpfAttribute, DIVERGENCE_ANGLE) => "MPFDivergenceAngle",
        (TagSpace::MpfAttribute, HORIZONTAL_AXIS_DISTANCE) => "MPFHorizontalAxisDistance",
        (TagSpace::MpfAttribute, VERTICAL_AXIS_DISTANCE) => "MPFVerticalAxisDistance",
        (TagSpace::MpfAttribute, COLLIMATION_AXIS_DISTANCE) => "MPFCollimationAxisDistance",
        (TagSpace::MpfAttribute, YAW_ANGLE) => "MPFYawAngle",
        (TagSpace::MpfAttribute, PITCH_ANGLE) => "MPFPitchAngle",
        (TagSpace::MpfAttribute, ROLL_ANGLE) => "MPFRollAngle",
        _ => return None,
    };
    Some(name)
}

/// If `seg` (an APP2 data segment) starts with an MPF header, returns the TIFF data after it.
pub fn mpf_payload(seg: &[u8]) -> Option<&[u8]> {
    seg.strip_prefix(&MPF_HEADER[..])
}

/// Decodes the TIFF structure of an MPF segment. `buf` starts with the TIFF header. `space` is
/// [`TagSpace::MpfIndex`] for the first image in a file and [`TagSpace::MpfAttribute`] for the
/// others.
pub fn parse_mpf_tree(buf: &[u8], space: TagSpace) -> Result<Directory> {
    Directory::parse(buf, space)
}

/// Tells an MP Index directory from an MP Attribute directory by the index-only tags it holds.
pub fn detect_space(dir: &Directory) -> TagSpace {
    if dir.field(NUMBER_OF_IMAGES).is_some() || dir.field(ENTRY).is_some() {
        TagSpace::MpfIndex
    } else {
        TagSpace::MpfAttribute
    }
}

/// Serializes an MPF tree, with the MPF header, into data for an APP2 segment.
pub fn make_mpf_segment(tree: &Directory) -> Vec<u8> {
    let mut seg = Vec::with_capacity(MPF_HEADER_SIZE + tree.serialized_size());
    seg.extend_from_slice(MPF_HEADER);
    seg.extend_from_slice(&tree.serialize());
    seg
}

/// Positions of the images in a file, from an MPF index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MpfIndex {
    /// File position from which MPF offsets are measured: the byte following the MPF header,
    /// 8 bytes past the APP2 marker.
    pub offset: u32,
    /// Offsets of the images, relative to the start of the file. The first image is always at
    /// offset 0.
    pub image_offsets: Vec<u32>,
    pub image_lengths: Vec<u32>,
}

impl MpfIndex {
    /// Reads the image positions from an MP Index directory. `offset` is the file position of
    /// the byte following the MPF header.
    pub fn from_directory(dir: &Directory, offset: u32) -> Result<MpfIndex> {
        let order = dir.order;
        let count = dir
            .field(NUMBER_OF_IMAGES)
            .and_then(|f| f.long(0, order))
            .unwrap_or(0);
        if count == 0 {
            return Err(Error::ZeroImageCount);
        }
        let entry = dir.field(ENTRY);
        let len = entry.map_or(0, |f| f.data.len());
        let too_short = Error::EntryTableTooShort { count, len };
        let Some(entry) = entry.filter(|_| len as u64 >= ENTRY_SIZE as u64 * count as u64) else {
            return Err(too_short);
        };

        let mut image_offsets = Vec::with_capacity(count as usize);
        let mut image_lengths = Vec::with_capacity(count as usize);
        for i in 0..count {
            let relative = entry
                .long(i * 4 + 2, order)
                .ok_or(Error::EntryTableTooShort { count, len })?;
            let length = entry
                .long(i * 4 + 1, order)
                .ok_or(Error::EntryTableTooShort { count, len })?;
            let absolute = if relative != 0 {
                relative.checked_add(offset).ok_or(Error::OffsetOverflow)?
            } else {
                0
            };
            // Only the first image, which contains the index, has an offset of zero.
            if (i == 0) != (absolute == 0) {
                return Err(Error::InvalidMpfOffsetPattern(i as usize));
            }
            image_offsets.push(absolute);
            image_lengths.push(length);
        }
        debug!(offset, ?image_offsets, ?image_lengths, "decoded MPF index");
        Ok(MpfIndex {
            offset,
            image_offsets,
            image_lengths,
        })
    }

    /// Builds an index for images written consecutively with no gaps, starting at `offsets`,
    /// with the last one ending at `end`.
    pub fn from_positions(offset: u32, offsets: Vec<u32>, end: u32) -> Result<MpfIndex> {
        let image_lengths = derive_lengths(&offsets, end)?;
        Ok(MpfIndex {
            offset,
            image_offsets: offsets,
            image_lengths,
        })
    }

    pub fn image_count(&self) -> usize {
        self.image_offsets.len()
    }

    /// Writes the image offsets and lengths into the entry table of an MP Index directory, in
    /// place. The size of the directory is unchanged.
    pub fn put_to_directory(&self, dir: &mut Directory) -> Result<()> {
        let order = dir.order;
        let count = self.image_offsets.len() as u32;
        let entry = dir
            .field_mut(ENTRY)
            .ok_or(Error::EntryTableTooShort { count, len: 0 })?;
        if entry.data.len() < ENTRY_SIZE * self.image_offsets.len() {
            return Err(Error::EntryTableTooShort {
                count,
                len: entry.data.len(),
            });
        }
        for (i, (&absolute, &length)) in self
            .image_offsets
            .iter()
            .zip(&self.image_lengths)
            .enumerate()
        {
            let relative = if absolute == 0 {
                0
            } else {
                absolute
                    .checked_sub(self.offset)
                    .filter(|&r| r > 0)
                    .ok_or(Error::OffsetOverflow)?
            };
            let i = i as u32;
            entry.put_long(i * 4 + 2, relative, order)?;
            entry.put_long(i * 4 + 1, length, order)?;
        }
        Ok(())
    }

    /// Positions `reader` at each image in turn and calls `f` with the reader, the image index
    /// and the image length.
    pub fn for_each_image<R, F>(&self, reader: &mut R, mut f: F) -> Result<()>
    where
        R: Read + Seek,
        F: FnMut(&mut R, usize, u32) -> Result<()>,
    {
        for (i, (&offset, &length)) in self
            .image_offsets
            .iter()
            .zip(&self.image_lengths)
            .enumerate()
        {
            reader.seek(SeekFrom::Start(offset as u64))?;
            f(reader, i, length)?;
        }
        Ok(())
    }
}

/// Lengths of images written consecutively with no gaps: the distance to the next image's
/// offset, and for the last image, the distance to `end`.
pub fn derive_lengths(offsets: &[u32], end: u32) -> Result<Vec<u32>> {
    if offsets.is_empty() {
        return Err(Error::ZeroImageCount);
    }
    offsets
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let next = offsets.get(i + 1).copied().unwrap_or(end);
            next.checked_sub(start)
                .ok_or(Error::InvalidMpfOffsetPattern(i))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use test_log::test;

    use super::*;
    use crate::tiff::{Endian, Field, FieldType};
    use crate::util::test::mpf_index_directory;

    #[test]
    fn lengths_from_offsets() {
        assert_eq!(
            derive_lengths(&[0, 1000, 2500], 3200).unwrap(),
            [1000, 1500, 700]
        );
        assert_eq!(derive_lengths(&[0], 10).unwrap(), [10]);
        assert!(matches!(
            derive_lengths(&[0, 1000, 900], 3200),
            Err(Error::InvalidMpfOffsetPattern(1))
        ));
        assert!(matches!(
            derive_lengths(&[], 3200),
            Err(Error::ZeroImageCount)
        ));
    }

    #[test]
    fn header() {
        assert_eq!(mpf_payload(b"MPF\0MM\0*"), Some(&b"MM\0*"[..]));
        assert_eq!(mpf_payload(b"MPF"), None);
        assert_eq!(mpf_payload(b"ICC_PROFILE\0"), None);
    }

    #[test]
    fn decode_index() {
        for order in [Endian::Big, Endian::Little] {
            let dir = mpf_index_directory(order, &[(0, 5000), (4000, 800), (4900, 100)]);
            let index = MpfIndex::from_directory(&dir, 30).unwrap();
            assert_eq!(index.offset, 30);
            assert_eq!(index.image_offsets, [0, 4030, 4930]);
            assert_eq!(index.image_lengths, [5000, 800, 100]);
            assert_eq!(index.image_count(), 3);
        }
    }

    #[test]
    fn encode_index_in_place() {
        let mut dir = mpf_index_directory(Endian::Big, &[(0, 1), (2, 3)]);
        let size = make_mpf_segment(&dir).len();
        let index = MpfIndex::from_positions(100, vec![0, 5000], 7000).unwrap();
        index.put_to_directory(&mut dir).unwrap();
        assert_eq!(make_mpf_segment(&dir).len(), size);
        assert_eq!(MpfIndex::from_directory(&dir, 100).unwrap(), index);
        assert_eq!(index.image_lengths, [5000, 2000]);
    }

    #[test]
    fn encode_offset_below_base() {
        let mut dir = mpf_index_directory(Endian::Big, &[(0, 1), (2, 3)]);
        let index = MpfIndex {
            offset: 100,
            image_offsets: vec![0, 50],
            image_lengths: vec![50, 50],
        };
        assert!(matches!(
            index.put_to_directory(&mut dir),
            Err(Error::OffsetOverflow)
        ));
    }

    #[test]
    fn zero_count() {
        let dir = mpf_index_directory(Endian::Big, &[]);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 0),
            Err(Error::ZeroImageCount)
        ));
    }

    #[test]
    fn short_entry_table() {
        let mut dir = mpf_index_directory(Endian::Big, &[(0, 1), (2, 3)]);
        dir.field_mut(ENTRY).unwrap().data.truncate(31);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 0),
            Err(Error::EntryTableTooShort { count: 2, len: 31 })
        ));
        dir.fields.retain(|f| f.tag != ENTRY);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 0),
            Err(Error::EntryTableTooShort { count: 2, len: 0 })
        ));
    }

    #[test]
    fn offset_patterns() {
        let dir = mpf_index_directory(Endian::Big, &[(10, 1), (2, 3)]);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 0),
            Err(Error::InvalidMpfOffsetPattern(0))
        ));
        let dir = mpf_index_directory(Endian::Big, &[(0, 1), (2, 3), (0, 3)]);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 0),
            Err(Error::InvalidMpfOffsetPattern(2))
        ));
        let dir = mpf_index_directory(Endian::Big, &[(0, 1), (u32::MAX - 5, 3)]);
        assert!(matches!(
            MpfIndex::from_directory(&dir, 10),
            Err(Error::OffsetOverflow)
        ));
    }

    #[test]
    fn segment_round_trip() {
        let mut dir = mpf_index_directory(Endian::Little, &[(0, 1), (2, 3)]);
        dir.fields.push(Field {
            tag: TOTAL_FRAMES,
            field_type: FieldType::Long,
            count: 1,
            data: vec![2, 0, 0, 0],
        });
        let seg = make_mpf_segment(&dir);
        let payload = mpf_payload(&seg).unwrap();
        assert_eq!(parse_mpf_tree(payload, TagSpace::MpfIndex).unwrap(), dir);
    }

    #[test]
    fn names() {
        assert_eq!(tag_name(TagSpace::MpfIndex, ENTRY), Some("MPFEntry"));
        assert_eq!(tag_name(TagSpace::MpfAttribute, VERSION), Some("MPFVersion"));
        assert_eq!(tag_name(TagSpace::MpfAttribute, ENTRY), None);
        assert_eq!(tag_name(TagSpace::MpfAttribute, ROLL_ANGLE), Some("MPFRollAngle"));
    }

    #[test]
    fn iterate_images() {
        let data: Vec<u8> = (0..100).collect();
        let index = MpfIndex::from_positions(4, vec![0, 40, 90], 100).unwrap();
        let mut seen = Vec::new();
        index
            .for_each_image(&mut Cursor::new(data), |reader, i, length| {
                let mut byte = [0u8];
                reader.read_exact(&mut byte)?;
                seen.push((i, byte[0], length));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, [(0, 0, 40), (1, 40, 50), (2, 90, 10)]);
    }
}
