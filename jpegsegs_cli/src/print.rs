// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{Read, Seek, SeekFrom, Write};

use color_eyre::eyre::Result;
use jpegsegs::mpf::processor::MpfProcessor;
use jpegsegs::mpf::{MpfIndex, mpf_payload, parse_mpf_tree, tag_name};
use jpegsegs::tiff::{Directory, TagSpace};
use jpegsegs::{Marker, Scanner};

/// Prints the markers of the image at the reader's position. APP2 segments are passed through
/// `processor`, which records the MPF index if it's a [`MpfProcessor::ReadIndex`].
fn print_image<R, W>(reader: &mut R, out: &mut W, processor: &mut MpfProcessor) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let space = match processor {
        MpfProcessor::ReadIndex { .. } => TagSpace::MpfIndex,
        _ => TagSpace::MpfAttribute,
    };
    let mut scanner = Scanner::new(reader)?;
    writeln!(out, "SOI")?;
    let mut data_bytes = 0;
    let mut restarts = 0;
    loop {
        let segment = scanner.scan()?;
        let marker = segment.marker;
        if marker.is_scan_data() {
            data_bytes += segment.data.map_or(0, <[u8]>::len);
            continue;
        }
        if marker.is_rst() {
            restarts += 1;
            continue;
        }
        if data_bytes > 0 || restarts > 0 {
            write!(out, "{data_bytes} bytes of image data")?;
            if restarts > 0 {
                write!(out, " and {restarts} restart markers")?;
            }
            writeln!(out)?;
            data_bytes = 0;
            restarts = 0;
        }
        let Some(data) = segment.data else {
            writeln!(out, "{marker}")?;
            if marker == Marker::EOI {
                return Ok(());
            }
            continue;
        };
        let len = data.len();
        if marker == Marker::APP2 {
            let seg = data.to_vec();
            let input_end = scanner.stream_position()?;
            if processor.process_app2(&seg, input_end, None)?.is_mpf {
                writeln!(out, "{marker}, {len} bytes (MPF segment)")?;
                if let Some(payload) = mpf_payload(&seg) {
                    print_tree(out, &parse_mpf_tree(payload, space)?)?;
                }
                continue;
            }
        }
        writeln!(out, "{marker}, {len} bytes")?;
    }
}

fn print_tree<W: Write>(out: &mut W, tree: &Directory) -> Result<()> {
    let mut ifd = Some(tree);
    while let Some(dir) = ifd {
        for field in &dir.fields {
            let name = tag_name(dir.space, field.tag)
                .map_or_else(|| format!("{:#06X}", field.tag), str::to_string);
            writeln!(out, "  {name}: {:?}, count {}", field.field_type, field.count)?;
        }
        ifd = dir.next.as_deref();
    }
    Ok(())
}

fn print_images<R, W>(reader: &mut R, out: &mut W, index: &MpfIndex) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let images = index.image_offsets.iter().zip(&index.image_lengths);
    // The first image has already been printed.
    for (i, (&offset, &length)) in images.enumerate().skip(1) {
        writeln!(out, "MPF image {} at offset {offset}, size {length}", i + 1)?;
        reader.seek(SeekFrom::Start(offset.into()))?;
        print_image(reader, out, &mut MpfProcessor::Check)?;
    }
    Ok(())
}

/// Prints the markers of the first image in a file and of any further images its MPF index
/// lists.
pub fn print_file<R, W>(reader: &mut R, out: &mut W) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let mut processor = MpfProcessor::ReadIndex { index: None };
    print_image(reader, out, &mut processor)?;
    match processor.index() {
        Some(index) => print_images(reader, out, index),
        None => Ok(()),
    }
}
