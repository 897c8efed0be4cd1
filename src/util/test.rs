// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::marker::Marker;
use crate::mpf::{ENTRY, ENTRY_SIZE, INDIVIDUAL_IMAGE_NUMBER, NUMBER_OF_IMAGES, VERSION};
use crate::tiff::{Directory, Endian, Field, FieldType, TagSpace};

/// Assembles JPEG streams byte by byte, starting with SOI.
pub struct JpegBuilder {
    data: Vec<u8>,
}

impl JpegBuilder {
    pub fn new() -> JpegBuilder {
        JpegBuilder {
            data: vec![0xFF, 0xD8],
        }
    }

    /// A marker followed by a length field and `payload`.
    pub fn segment(mut self, marker: Marker, payload: &[u8]) -> JpegBuilder {
        let len = u16::try_from(payload.len() + 2).unwrap();
        self.data.extend_from_slice(&[0xFF, marker.0]);
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.extend_from_slice(payload);
        self
    }

    /// A marker with no length field.
    pub fn marker(mut self, marker: Marker) -> JpegBuilder {
        self.data.extend_from_slice(&[0xFF, marker.0]);
        self
    }

    /// Entropy-coded data, with a zero inserted after each 0xFF.
    pub fn scan_data(mut self, data: &[u8]) -> JpegBuilder {
        for &b in data {
            self.data.push(b);
            if b == 0xFF {
                self.data.push(0);
            }
        }
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> JpegBuilder {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

fn tables(builder: JpegBuilder) -> JpegBuilder {
    let mut dqt = vec![0x00];
    dqt.extend(1..=64u8);
    let mut dht = vec![0x00, 1];
    dht.extend_from_slice(&[0; 15]);
    dht.push(0x00);
    builder
        .segment(Marker::DQT, &dqt)
        .segment(Marker::SOF0, &[8, 0, 16, 0, 16, 1, 1, 0x11, 0])
        .segment(Marker::DHT, &dht)
}

fn scan(builder: JpegBuilder, seed: u8) -> JpegBuilder {
    builder
        .segment(Marker::SOS, &[1, 1, 0x00, 0, 63, 0])
        .scan_data(&[0x12, 0xFF, 0x34, seed])
        .marker(Marker::RST0)
        .scan_data(&[0x78, seed, 0xFF])
        .marker(Marker::EOI)
}

/// A small baseline JPEG with restart markers and stuffed bytes in its scan data. It uses no fill
/// bytes, so dumping its scanned segments reproduces it exactly.
pub fn sample_jpeg() -> Vec<u8> {
    let builder = JpegBuilder::new().segment(Marker::APP0, b"JFIF\0");
    scan(tables(builder), 0x56).build()
}

fn version() -> Field {
    Field {
        tag: VERSION,
        field_type: FieldType::Undefined,
        count: 4,
        data: b"0100".to_vec(),
    }
}

fn long(tag: u16, order: Endian, value: u32) -> Field {
    let mut data = vec![0; 4];
    order.write_u32(&mut data, value);
    Field {
        tag,
        field_type: FieldType::Long,
        count: 1,
        data,
    }
}

/// An MP Attribute directory for the `image_number`th image.
pub fn mpf_attribute_directory(order: Endian, image_number: u32) -> Directory {
    Directory {
        order,
        space: TagSpace::MpfAttribute,
        fields: vec![
            version(),
            long(INDIVIDUAL_IMAGE_NUMBER, order, image_number),
        ],
        next: None,
    }
}

/// An MP Index directory with one entry per `(relative offset, length)` pair, followed by the
/// attribute directory of the first image.
pub fn mpf_index_directory(order: Endian, images: &[(u32, u32)]) -> Directory {
    let mut entries = vec![0; ENTRY_SIZE * images.len()];
    for (record, &(offset, length)) in entries.chunks_exact_mut(ENTRY_SIZE).zip(images) {
        // Attribute: baseline MP primary image for the first entry.
        let attribute = if offset == 0 { 0x2003_0000 } else { 0 };
        order.write_u32(&mut record[0..], attribute);
        order.write_u32(&mut record[4..], length);
        order.write_u32(&mut record[8..], offset);
    }
    Directory {
        order,
        space: TagSpace::MpfIndex,
        fields: vec![
            version(),
            long(NUMBER_OF_IMAGES, order, images.len() as u32),
            Field {
                tag: ENTRY,
                field_type: FieldType::Undefined,
                count: entries.len() as u32,
                data: entries,
            },
        ],
        next: Some(Box::new(mpf_attribute_directory(order, 1))),
    }
}

/// Position of the byte following the MPF header in [`mpf_file`]: SOI, the APP0 segment, then
/// the APP2 marker, its length and the MPF header.
pub const MPF_FILE_BASE: u32 = 2 + 9 + 8;

fn mpf_app2(tree: &Directory) -> Vec<u8> {
    let mut seg = b"MPF\0".to_vec();
    seg.extend_from_slice(&tree.serialize());
    seg
}

fn first_image(order: Endian, images: &[(u32, u32)]) -> Vec<u8> {
    let builder = JpegBuilder::new()
        .segment(Marker::APP0, b"JFIF\0")
        .segment(Marker::APP2, &mpf_app2(&mpf_index_directory(order, images)));
    scan(tables(builder), 1).build()
}

fn other_image(order: Endian, image_number: u32) -> Vec<u8> {
    let builder = JpegBuilder::new()
        .segment(
            Marker::APP2,
            &mpf_app2(&mpf_attribute_directory(order, image_number)),
        )
        .segment(Marker::COM, b"secondary");
    scan(tables(builder), image_number as u8).build()
}

/// A file holding three images indexed with MPF, with `gap` zero bytes after each of the first
/// two images.
pub struct MpfFile {
    pub data: Vec<u8>,
    pub offsets: Vec<u32>,
    pub lengths: Vec<u32>,
}

pub fn mpf_file(order: Endian, gap: usize) -> MpfFile {
    let second = other_image(order, 2);
    let third = other_image(order, 3);
    // Changing the index values doesn't change its size.
    let first_len = first_image(order, &[(0, 0), (1, 0), (2, 0)]).len();
    let offsets = vec![
        0,
        (first_len + gap) as u32,
        (first_len + gap + second.len() + gap) as u32,
    ];
    let lengths = vec![first_len as u32, second.len() as u32, third.len() as u32];
    let first = first_image(
        order,
        &[
            (0, lengths[0]),
            (offsets[1] - MPF_FILE_BASE, lengths[1]),
            (offsets[2] - MPF_FILE_BASE, lengths[2]),
        ],
    );
    assert_eq!(first.len(), first_len);

    let mut data = first;
    data.resize(data.len() + gap, 0);
    data.extend_from_slice(&second);
    data.resize(data.len() + gap, 0);
    data.extend_from_slice(&third);
    MpfFile {
        data,
        offsets,
        lengths,
    }
}
