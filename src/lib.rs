// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reading and writing of JPEG files one marker and segment at a time, with support for the
//! Multi-Picture Format (MPF) used to store several images in one file.

#![deny(unsafe_code)]
pub mod codec;
pub mod copy;
pub mod dumper;
pub mod error;
pub mod marker;
pub mod mpf;
pub mod scanner;
pub mod segment;
pub mod stuffing;
pub mod tiff;
mod util;

pub use dumper::Dumper;
pub use error::{Error, Result};
pub use marker::Marker;
pub use scanner::Scanner;
pub use segment::{OwnedSegment, Segment};
