// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! A minimal TIFF tag directory codec, as used for MPF data.
//!
//! Directories are decoded into owned trees and serialized back with a layout that only depends
//! on the number of fields and their types and counts, never on their values. Changing field
//! values therefore never changes the serialized size.

use std::collections::HashSet;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Size of a TIFF header: byte order mark, magic number and first directory offset.
pub const HEADER_SIZE: usize = 8;

const MAGIC: u16 = 42;
const ENTRY_SIZE: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Endian::Little => LittleEndian::write_u16(buf, value),
            Endian::Big => BigEndian::write_u16(buf, value),
        }
    }

    pub fn write_u32(self, buf: &mut [u8], value: u32) {
        match self {
            Endian::Little => LittleEndian::write_u32(buf, value),
            Endian::Big => BigEndian::write_u32(buf, value),
        }
    }

    fn mark(self) -> &'static [u8; 2] {
        match self {
            Endian::Little => b"II",
            Endian::Big => b"MM",
        }
    }
}

/// Tag vocabulary of a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagSpace {
    /// MP Index IFD, found in the MPF segment of the first image. It's followed by an attribute
    /// IFD for the first image.
    MpfIndex,
    /// MP Attribute IFD.
    MpfAttribute,
}

impl TagSpace {
    /// Space of the directory that follows one in this space.
    fn next(self) -> TagSpace {
        TagSpace::MpfAttribute
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
}

impl FieldType {
    pub fn from_u16(value: u16) -> Option<FieldType> {
        Some(match value {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            _ => return None,
        })
    }

    /// Size in bytes of a single value.
    pub fn size(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }
}

/// A tagged field. `data` holds the raw value bytes in the directory's byte order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub data: Vec<u8>,
}

impl Field {
    /// Reads the `index`th 32-bit value of the field data.
    pub fn long(&self, index: u32, order: Endian) -> Option<u32> {
        let start = (index as usize).checked_mul(4)?;
        let bytes = self.data.get(start..start.checked_add(4)?)?;
        Some(order.read_u32(bytes))
    }

    /// Overwrites the `index`th 32-bit value of the field data, in place.
    pub fn put_long(&mut self, index: u32, value: u32, order: Endian) -> Result<()> {
        let start = index as usize * 4;
        let bytes = self
            .data
            .get_mut(start..start + 4)
            .ok_or(Error::DirectoryOutOfBounds(start))?;
        order.write_u32(bytes, value);
        Ok(())
    }

    // Bytes used outside the 12-byte entry, padded to a word boundary.
    fn external_size(&self) -> usize {
        if self.data.len() <= 4 {
            0
        } else {
            self.data.len() + (self.data.len() & 1)
        }
    }
}

/// A decoded image file directory and the chain of directories following it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    pub order: Endian,
    pub space: TagSpace,
    pub fields: Vec<Field>,
    pub next: Option<Box<Directory>>,
}

impl Directory {
    /// Decodes a TIFF structure. `buf` starts with the TIFF header; offsets are relative to it.
    pub fn parse(buf: &[u8], space: TagSpace) -> Result<Directory> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::InvalidTiffHeader);
        }
        let order = match &buf[..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(Error::InvalidTiffHeader),
        };
        if order.read_u16(&buf[2..]) != MAGIC {
            return Err(Error::InvalidTiffHeader);
        }
        let offset = order.read_u32(&buf[4..]) as usize;
        let mut visited = HashSet::new();
        Self::parse_ifd(buf, order, offset, space, &mut visited)
    }

    fn parse_ifd(
        buf: &[u8],
        order: Endian,
        offset: usize,
        space: TagSpace,
        visited: &mut HashSet<usize>,
    ) -> Result<Directory> {
        if !visited.insert(offset) {
            return Err(Error::DirectoryLoop(offset));
        }
        let count_bytes = buf
            .get(offset..offset + 2)
            .ok_or(Error::DirectoryOutOfBounds(offset))?;
        let num_entries = order.read_u16(count_bytes) as usize;
        let entries_start = offset + 2;
        let entries_end = entries_start + num_entries * ENTRY_SIZE;
        let next_bytes = buf
            .get(entries_end..entries_end + 4)
            .ok_or(Error::DirectoryOutOfBounds(entries_end))?;
        let next_offset = order.read_u32(next_bytes) as usize;

        let mut fields = Vec::with_capacity(num_entries);
        for entry in buf[entries_start..entries_end].chunks_exact(ENTRY_SIZE) {
            let tag = order.read_u16(&entry[0..]);
            let raw_type = order.read_u16(&entry[2..]);
            let field_type =
                FieldType::from_u16(raw_type).ok_or(Error::InvalidFieldType(tag, raw_type))?;
            let count = order.read_u32(&entry[4..]);
            let size = (count as usize)
                .checked_mul(field_type.size())
                .ok_or(Error::DirectoryOutOfBounds(offset))?;
            let data = if size <= 4 {
                entry[8..8 + size].to_vec()
            } else {
                let start = order.read_u32(&entry[8..]) as usize;
                let end = start
                    .checked_add(size)
                    .ok_or(Error::DirectoryOutOfBounds(start))?;
                buf.get(start..end)
                    .ok_or(Error::DirectoryOutOfBounds(start))?
                    .to_vec()
            };
            fields.push(Field {
                tag,
                field_type,
                count,
                data,
            });
        }

        let next = if next_offset != 0 {
            Some(Box::new(Self::parse_ifd(
                buf,
                order,
                next_offset,
                space.next(),
                visited,
            )?))
        } else {
            None
        };
        Ok(Directory {
            order,
            space,
            fields,
            next,
        })
    }

    pub fn field(&self, tag: u16) -> Option<&Field> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    pub fn field_mut(&mut self, tag: u16) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.tag == tag)
    }

    /// Size of this directory alone, including out-of-line values.
    fn ifd_size(&self) -> usize {
        2 + self.fields.len() * ENTRY_SIZE
            + 4
            + self.fields.iter().map(Field::external_size).sum::<usize>()
    }

    /// Serialized size of this directory and the ones following it, excluding the TIFF header.
    pub fn tree_size(&self) -> usize {
        let mut size = 0;
        let mut ifd = Some(self);
        while let Some(dir) = ifd {
            size += dir.ifd_size();
            ifd = dir.next.as_deref();
        }
        size
    }

    /// Serialized size including the TIFF header.
    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.tree_size()
    }

    /// Encodes the TIFF header and the directory chain, each directory immediately followed by
    /// its out-of-line values.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.serialized_size()];
        buf[..2].copy_from_slice(self.order.mark());
        self.order.write_u16(&mut buf[2..], MAGIC);
        self.order.write_u32(&mut buf[4..], HEADER_SIZE as u32);
        let mut pos = HEADER_SIZE;
        let mut ifd = Some(self);
        while let Some(dir) = ifd {
            pos = dir.put_ifd(&mut buf, pos);
            ifd = dir.next.as_deref();
        }
        debug_assert_eq!(pos, buf.len());
        buf
    }

    // Writes one directory at `pos`, returning the position following it.
    fn put_ifd(&self, buf: &mut [u8], pos: usize) -> usize {
        let order = self.order;
        let end = pos + self.ifd_size();
        order.write_u16(&mut buf[pos..], self.fields.len() as u16);
        let mut entry_pos = pos + 2;
        let mut data_pos = entry_pos + self.fields.len() * ENTRY_SIZE + 4;
        for field in &self.fields {
            let entry = &mut buf[entry_pos..entry_pos + ENTRY_SIZE];
            order.write_u16(&mut entry[0..], field.tag);
            order.write_u16(&mut entry[2..], field.field_type as u16);
            order.write_u32(&mut entry[4..], field.count);
            if field.data.len() <= 4 {
                entry[8..8 + field.data.len()].copy_from_slice(&field.data);
            } else {
                order.write_u32(&mut entry[8..], data_pos as u32);
                buf[data_pos..data_pos + field.data.len()].copy_from_slice(&field.data);
                data_pos += field.external_size();
            }
            entry_pos += ENTRY_SIZE;
        }
        let next_offset = if self.next.is_some() { end as u32 } else { 0 };
        order.write_u32(&mut buf[entry_pos..], next_offset);
        end
    }
}
