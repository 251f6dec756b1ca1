// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use rvsoc_core::memory::{BootImage, Segment};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse ELF binary: {0}")]
    Elf(#[from] goblin::error::Error),
    #[error("Segment at {addr:#x} is out of bounds in ELF file or memory map")]
    SegmentOutOfBounds { addr: u64 },
    #[error("Invalid hex word '{token}' on line {line}")]
    InvalidHex { line: usize, token: String },
    #[error("Unsupported image format: {0:?}")]
    UnsupportedFormat(PathBuf),
    #[error("Image contains no loadable data")]
    Empty,
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bin,
    Hex,
    Elf,
}

impl ImageFormat {
    /// ELF magic wins over the extension.
    pub fn detect(path: &Path, bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x7fELF") {
            return Some(ImageFormat::Elf);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bin" => Some(ImageFormat::Bin),
            "hex" | "txt" => Some(ImageFormat::Hex),
            "elf" => Some(ImageFormat::Elf),
            _ => None,
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a boot image, dispatching on the file contents and extension.
pub fn load_image(path: &Path) -> Result<BootImage> {
    let bytes = read(path)?;
    let format = ImageFormat::detect(path, &bytes)
        .ok_or_else(|| LoaderError::UnsupportedFormat(path.to_path_buf()))?;
    info!("Loading {:?} image from {:?}", format, path);
    match format {
        ImageFormat::Elf => load_elf_bytes(&bytes),
        ImageFormat::Bin => Ok(BootImage::from_rom(load_bin_bytes(&bytes)?)),
        ImageFormat::Hex => {
            let words = parse_hex(&String::from_utf8_lossy(&bytes))?;
            Ok(BootImage::from_rom(words))
        }
    }
}

/// Loads raw words for a RAM preload. ELF files are not accepted here.
pub fn load_words(path: &Path) -> Result<Vec<u32>> {
    let bytes = read(path)?;
    match ImageFormat::detect(path, &bytes) {
        Some(ImageFormat::Bin) => load_bin_bytes(&bytes),
        Some(ImageFormat::Hex) => parse_hex(&String::from_utf8_lossy(&bytes)),
        _ => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_bin_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() {
        return Err(LoaderError::Empty);
    }
    Ok(BootImage::words_from_bytes(bytes))
}

/// One word per whitespace-separated token; `0x` is optional and `#`
/// starts a comment.
pub fn parse_hex(text: &str) -> Result<Vec<u32>> {
    let mut words = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or("");
        for token in content.split_whitespace() {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let word = u32::from_str_radix(digits, 16).map_err(|_| LoaderError::InvalidHex {
                line: index + 1,
                token: token.to_string(),
            })?;
            words.push(word);
        }
    }
    if words.is_empty() {
        return Err(LoaderError::Empty);
    }
    debug!("Parsed {} hex words", words.len());
    Ok(words)
}

pub fn load_elf(path: &Path) -> Result<BootImage> {
    load_elf_bytes(&read(path)?)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<BootImage> {
    let elf = Elf::parse(buffer)?;

    info!("ELF Entry Point: {:#x}", elf.entry);
    if elf.header.e_machine != goblin::elf::header::EM_RISCV {
        warn!("ELF machine type {} is not RISC-V", elf.header.e_machine);
    }

    let mut image = BootImage {
        entry: elf.entry as u32,
        ..Default::default()
    };
    let mut placed = 0;

    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_filesz == 0 {
            continue;
        }
        // Load address, so initialised data lands where the startup code
        // copies it from.
        let start_addr = ph.p_paddr;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let data = offset
            .checked_add(size)
            .and_then(|end| buffer.get(offset..end))
            .ok_or(LoaderError::SegmentOutOfBounds { addr: start_addr })?;

        let Ok(start_addr) = u32::try_from(start_addr) else {
            warn!("Segment at {:#x} is outside the 32-bit address space", start_addr);
            continue;
        };
        let segment = Segment {
            start_addr,
            data: data.to_vec(),
        };
        let fits = image.place_segment(&segment).map_err(|e| {
            warn!("Segment at {:#x} does not fit its window: {}", start_addr, e);
            LoaderError::SegmentOutOfBounds {
                addr: u64::from(start_addr),
            }
        })?;
        if fits {
            placed += 1;
        } else {
            warn!(
                "Failed to load segment at {:#x} - outside of memory map",
                start_addr
            );
        }
    }

    if placed == 0 {
        warn!("No loadable segments found in ELF file");
        return Err(LoaderError::Empty);
    }
    info!(
        "Loaded {} segments: {} boot words, {} RAM words",
        placed,
        image.rom.len(),
        image.ram.len()
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let text = "# boot program\n00500093 0x00108093\n\n0X0000006f # loop\n";
        assert_eq!(
            parse_hex(text).unwrap(),
            vec![0x0050_0093, 0x0010_8093, 0x0000_006F]
        );
    }

    #[test]
    fn test_parse_hex_errors() {
        let err = parse_hex("00500093\n12zz\n").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidHex { line: 2, .. }));
        assert!(matches!(parse_hex("# nothing\n"), Err(LoaderError::Empty)));
        assert!(parse_hex("123456789").is_err());
    }

    #[test]
    fn test_bin_pads_last_word() {
        assert_eq!(
            load_bin_bytes(&[0x93, 0x00, 0x50, 0x00, 0x6F]).unwrap(),
            vec![0x0050_0093, 0x6F]
        );
        assert!(matches!(load_bin_bytes(&[]), Err(LoaderError::Empty)));
    }

    #[test]
    fn test_detect_format() {
        let p = Path::new("prog.bin");
        assert_eq!(ImageFormat::detect(p, b"\x7fELF...."), Some(ImageFormat::Elf));
        assert_eq!(ImageFormat::detect(p, b"abcd"), Some(ImageFormat::Bin));
        assert_eq!(
            ImageFormat::detect(Path::new("prog.TXT"), b"0"),
            Some(ImageFormat::Hex)
        );
        assert_eq!(ImageFormat::detect(Path::new("prog.s"), b"0"), None);
    }

    #[test]
    fn test_garbage_elf() {
        assert!(matches!(
            load_elf_bytes(b"\x7fELF\x01\x01"),
            Err(LoaderError::Elf(_))
        ));
    }
}
