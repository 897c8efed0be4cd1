// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Whole-image operations built on [`Scanner`] and [`Dumper`], including copying of files with
//! multiple images indexed by MPF.
//!
//! Copying an MPF file takes two passes over the output. The index segment of the first image is
//! written with its original values, then every image is copied, and finally the index segment is
//! overwritten in place with the new image positions. This relies on the serialized size of the
//! index not depending on its values.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::{write_data, write_marker};
use crate::dumper::Dumper;
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::mpf::processor::{IndexRewrite, MpfProcessor, output_mpf_offset};
use crate::mpf::{MpfIndex, make_mpf_segment};
use crate::scanner::Scanner;
use crate::util::tracing_wrappers::*;

/// Copies one image, from SOI through EOI, passing APP2 segments through `processor`.
///
/// `reader` and `writer` must be positioned at the start of the image and at the point where it
/// should be written. Both are left just past the EOI marker.
pub fn copy_image<R, W>(reader: &mut R, writer: &mut W, processor: &mut MpfProcessor) -> Result<()>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut scanner = Scanner::new(reader)?;
    let mut dumper = Dumper::new(writer)?;
    loop {
        let segment = scanner.scan()?;
        let marker = segment.marker;
        if marker == Marker::APP2 && !matches!(processor, MpfProcessor::Ignore) {
            let seg = segment.data.unwrap_or_default().to_vec();
            let input_end = scanner.stream_position()?;
            let output_start = dumper.stream_position()?;
            let processed = processor.process_app2(&seg, input_end, Some(output_start))?;
            if processed.is_mpf {
                debug!(input_end, output_start, len = seg.len(), "copying MPF segment");
            }
            dumper.dump(marker, Some(&processed.data))?;
            continue;
        }
        dumper.dump_segment(segment)?;
        if marker == Marker::EOI {
            return Ok(());
        }
    }
}

/// Scans the first image in `reader` and returns its MPF index, if it has one.
pub fn find_mpf_index<R: Read + Seek>(reader: &mut R) -> Result<Option<MpfIndex>> {
    let mut processor = MpfProcessor::ReadIndex { index: None };
    let mut scanner = Scanner::new(reader)?;
    loop {
        let segment = scanner.scan()?;
        match segment.marker {
            Marker::EOI => break,
            Marker::APP2 => {
                let seg = segment.data.unwrap_or_default().to_vec();
                let input_end = scanner.stream_position()?;
                processor.process_app2(&seg, input_end, None)?;
            }
            _ => {}
        }
    }
    Ok(processor.index().cloned())
}

/// Copies a file that may hold several images indexed by MPF.
///
/// The first image is copied along with anything it contains. If it has an MPF index, each
/// further image is read from the position the index gives and written immediately after the
/// previous one, so data between or after images in the input is dropped. The index is then
/// rewritten to describe the output. Returns the new index, or `None` if the first image has no
/// MPF index, in which case only that image is copied.
pub fn copy_mpf_file<R, W>(reader: &mut R, writer: &mut W) -> Result<Option<MpfIndex>>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut first = MpfProcessor::RewriteIndex { rewrite: None };
    copy_image(reader, writer, &mut first)?;
    let MpfProcessor::RewriteIndex {
        rewrite: Some(rewrite),
    } = first
    else {
        debug!("no MPF index, copied a single image");
        return Ok(None);
    };

    let mut offsets = Vec::with_capacity(rewrite.index.image_count());
    rewrite
        .index
        .for_each_image(reader, |reader, i, _| {
            if i == 0 {
                offsets.push(0);
                return Ok(());
            }
            let start = writer.stream_position()?;
            debug!(image = i, output = start, "copying MPF image");
            offsets.push(u32::try_from(start).map_err(|_| Error::OffsetOverflow)?);
            copy_image(reader, &mut *writer, &mut MpfProcessor::RewriteAttributes)
        })?;

    let end = writer.stream_position()?;
    let end = u32::try_from(end).map_err(|_| Error::OffsetOverflow)?;
    rewrite_mpf(writer, &rewrite, offsets, end).map(Some)
}

/// Overwrites the MPF index segment reserved by [`MpfProcessor::RewriteIndex`] with the image
/// positions `offsets`, the last image ending at `end`. The stream is left where it was.
///
/// Fails with [`Error::BackpatchSizeMismatch`] if the new segment doesn't have the reserved size.
pub fn rewrite_mpf<W: Write + Seek>(
    writer: &mut W,
    rewrite: &IndexRewrite,
    offsets: Vec<u32>,
    end: u32,
) -> Result<MpfIndex> {
    let index = MpfIndex::from_positions(output_mpf_offset(rewrite.write_pos)?, offsets, end)?;
    let mut tree = rewrite.tree.clone();
    index.put_to_directory(&mut tree)?;
    let data = make_mpf_segment(&tree);
    if data.len() != rewrite.reserved_len {
        return Err(Error::BackpatchSizeMismatch {
            reserved: rewrite.reserved_len,
            actual: data.len(),
        });
    }

    let pos = writer.stream_position()?;
    writer.seek(SeekFrom::Start(rewrite.write_pos))?;
    write_marker(writer, Marker::APP2)?;
    write_data(writer, &data)?;
    writer.seek(SeekFrom::Start(pos))?;
    debug!(
        write_pos = rewrite.write_pos,
        len = data.len(),
        ?index,
        "rewrote MPF index"
    );
    Ok(index)
}

/// Copies the first image without its COM, APPn and JPGn segments. Anything after the first EOI,
/// such as further MPF images, is dropped.
pub fn strip_image<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: Read + Seek,
    W: Write,
{
    let mut scanner = Scanner::new(reader)?;
    let mut dumper = Dumper::new(writer)?;
    loop {
        let segment = scanner.scan()?;
        let marker = segment.marker;
        if marker == Marker::COM || marker.is_app() || marker.is_jpg_ext() {
            trace!(%marker, "dropping segment");
            continue;
        }
        dumper.dump_segment(segment)?;
        if marker == Marker::EOI {
            return Ok(());
        }
    }
}
