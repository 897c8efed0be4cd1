// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};

mod print;

#[derive(Parser)]
#[command(name = "jpegsegs", about = "Works on JPEG files one segment at a time")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lists the markers and segment sizes of a file, including further MPF images
    Print {
        /// Input JPEG file
        input: PathBuf,
    },
    /// Copies a file segment by segment, with any further MPF images and an updated MPF index
    Copy { input: PathBuf, output: PathBuf },
    /// Copies the first image of a file without its COM, APPn and JPGn segments
    Strip { input: PathBuf, output: PathBuf },
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).wrap_err_with(|| format!("Cannot open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).wrap_err_with(|| format!("Cannot create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    #[cfg(feature = "tracing-subscriber")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env())
            .init();
    }

    match Opt::parse().command {
        Command::Print { input } => {
            let mut reader = open(&input)?;
            let stdout = std::io::stdout();
            print::print_file(&mut reader, &mut stdout.lock())
                .wrap_err_with(|| format!("Failed to read {}", input.display()))
        }
        Command::Copy { input, output } => {
            let mut reader = open(&input)?;
            let mut writer = create(&output)?;
            let index = jpegsegs::copy::copy_mpf_file(&mut reader, &mut writer)
                .wrap_err_with(|| format!("Failed to copy {}", input.display()))?;
            writer.flush()?;
            if let Some(index) = index {
                println!("Copied {} images", index.image_count());
            }
            Ok(())
        }
        Command::Strip { input, output } => {
            let mut reader = open(&input)?;
            let mut writer = create(&output)?;
            jpegsegs::copy::strip_image(&mut reader, &mut writer)
                .wrap_err_with(|| format!("Failed to strip {}", input.display()))?;
            writer.flush()?;
            Ok(())
        }
    }
}
