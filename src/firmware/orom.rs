//! Legacy Option-ROM Scanner
//!
//! On legacy (non-EFI) boots the Intel RAID option ROM stays shadowed in
//! the ISA expansion window and carries the capability descriptor somewhere
//! in its image, tagged `$VER`.
//!
//! # Memory Window
//!
//! ```text
//! 0xC0000  video ROM
//! 0xC8000  adapter ROMs, each starting on an `align` boundary
//! 0xE0000  extension / system BIOS (not scanned)
//! ```
//!
//! Each ROM starts with `55 AA`, stores its length in 512-byte units at
//! byte 2, sums to zero, and points at its PCI Data Structure at 0x18.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::capability::{Capability, OROM_SIGNATURE};
use crate::error::{Error, Result};

/// Physical start of the scanned window.
pub const ROM_WINDOW_START: u64 = 0xc_0000;
/// Physical end (exclusive) of the scanned window.
pub const ROM_WINDOW_END: u64 = 0xf_0000;
/// First address an adapter ROM may occupy.
pub const ADAPTER_ROM_START: u64 = 0xc_8000;
/// End (exclusive) of the adapter ROM area.
pub const ADAPTER_ROM_END: u64 = 0xe_0000;

/// Default adapter ROM alignment.
pub const DEFAULT_ROM_ALIGN: usize = 512;
/// Slower alignment that tolerates misbehaving BIOSes.
pub const SAFE_ROM_ALIGN: usize = 2048;

const ROM_SIGNATURE: [u8; 2] = [0x55, 0xaa];
const PCI_DATA_POINTER: usize = 0x18;
/// Bytes of the PCI Data Structure that must be addressable.
const PCI_DATA_MIN_LEN: usize = 0x18;

/// One adapter ROM image copied out of memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRom {
    /// Physical address of the first byte
    pub base: u64,
    pub image: Vec<u8>,
}

/// Source of raw option ROM images.
pub trait RomSource: Send + Sync {
    /// Adapter ROMs found at `align` byte boundaries.
    fn option_roms(&self, align: usize) -> Result<Vec<OptionRom>>;
}

/// Reads the expansion window from `/dev/mem`.
#[derive(Debug, Clone)]
pub struct DevMemRoms {
    path: PathBuf,
}

impl DevMemRoms {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RomSource for DevMemRoms {
    fn option_roms(&self, align: usize) -> Result<Vec<OptionRom>> {
        let mut mem = File::open(&self.path).map_err(|e| Error::from_io(&self.path, e))?;
        mem.seek(SeekFrom::Start(ROM_WINDOW_START))?;

        let mut window = vec![0u8; (ROM_WINDOW_END - ROM_WINDOW_START) as usize];
        mem.read_exact(&mut window)?;

        Ok(split_option_roms(&window, ROM_WINDOW_START, align))
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Length of a valid ROM at `offset`, if one starts there.
fn rom_at(window: &[u8], offset: usize) -> Option<usize> {
    let header = window.get(offset..offset + 3)?;
    if header[..2] != ROM_SIGNATURE {
        return None;
    }
    let len = header[2] as usize * 512;
    if len == 0 {
        return None;
    }
    let image = window.get(offset..offset + len)?;
    let sum = image.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (sum == 0).then_some(len)
}

/// Split a copy of the expansion window into adapter ROM images.
///
/// `window_base` is the physical address of `window[0]`.
pub fn split_option_roms(window: &[u8], window_base: u64, align: usize) -> Vec<OptionRom> {
    let align = align.max(1) as u64;
    let window_end = window_base + window.len() as u64;
    let offset_of = |addr: u64| (addr - window_base) as usize;

    let mut start = ADAPTER_ROM_START;
    if window_base <= ROM_WINDOW_START && ROM_WINDOW_START < window_end {
        if let Some(len) = rom_at(window, offset_of(ROM_WINDOW_START)) {
            let video_end = ROM_WINDOW_START + len as u64;
            start = start.max(align_up(video_end, align));
        }
    }

    let mut roms = Vec::new();
    while start < ADAPTER_ROM_END && start < window_end {
        if start < window_base {
            start += align;
            continue;
        }
        let offset = offset_of(start);
        match rom_at(window, offset) {
            Some(len) if start + len as u64 <= ADAPTER_ROM_END => {
                roms.push(OptionRom {
                    base: start,
                    image: window[offset..offset + len].to_vec(),
                });
                start = align_up(start + len as u64, align);
            }
            _ => start += align,
        }
    }
    roms
}

/// A capability descriptor found in an option ROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OromMatch {
    pub capability: Capability,
    /// Device ids the ROM declares support for
    pub device_ids: Vec<u16>,
}

fn le16(raw: &[u8], offset: usize) -> Option<u16> {
    raw.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

/// Look for a capability descriptor in one ROM image.
///
/// ROMs for another vendor, or whose PCI header names a device for which
/// `is_known` already holds, are skipped.
pub fn scan_rom(
    rom: &OptionRom,
    vendor_id: u16,
    is_known: &dyn Fn(u16) -> bool,
) -> Option<OromMatch> {
    let image = &rom.image;
    let pcir = le16(image, PCI_DATA_POINTER)? as usize;
    if pcir + PCI_DATA_MIN_LEN > image.len() {
        debug!(base = format_args!("{:#x}", rom.base), "cannot find PCI data structure");
        return None;
    }
    let data = &image[pcir..];

    let vendor = le16(data, 4)?;
    let device = le16(data, 6)?;
    debug!(
        base = format_args!("{:#x}", rom.base),
        vendor = format_args!("{:#06x}", vendor),
        device = format_args!("{:#06x}", device),
        "Inspecting option ROM"
    );
    if vendor != vendor_id || is_known(device) {
        return None;
    }

    let signature_at = (0..image.len())
        .step_by(4)
        .find(|&offset| image[offset..].starts_with(&OROM_SIGNATURE))?;
    let capability = Capability::from_bytes(&image[signature_at..])?;

    let revision = data[12];
    let list_offset = le16(data, 8)? as usize;
    let device_ids = if revision >= 3 && list_offset != 0 {
        let list = data.get(list_offset..).unwrap_or_default();
        list.chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .take_while(|&id| id != 0)
            .collect()
    } else {
        vec![device]
    };

    Some(OromMatch {
        capability,
        device_ids,
    })
}

/// Scan every adapter ROM supplied by `source`.
#[instrument(skip(source, is_known))]
pub fn scan_option_roms(
    source: &dyn RomSource,
    align: usize,
    vendor_id: u16,
    is_known: &dyn Fn(u16) -> bool,
) -> Vec<OromMatch> {
    let roms = match source.option_roms(align) {
        Ok(roms) => roms,
        Err(e) => {
            debug!(error = %e, "Option ROM window unavailable");
            return Vec::new();
        }
    };

    let mut matches: Vec<OromMatch> = Vec::new();
    for rom in &roms {
        let seen = |id: u16| is_known(id) || matches.iter().any(|m| m.device_ids.contains(&id));
        let found = scan_rom(rom, vendor_id, &seen);
        if let Some(found) = found {
            matches.push(found);
        }
    }
    debug!(roms = roms.len(), matches = matches.len(), "Option ROM scan complete");
    matches
}
