//! ACPI UEFI Table Scanner
//!
//! Some platforms hand EFI variable contents to the OS as ACPI `UEFI`
//! tables instead of (or as well as) runtime variables. The kernel exposes
//! them as `/sys/firmware/acpi/tables/UEFI`, `UEFI1`, `UEFI2`, ...
//!
//! # Table Layout
//!
//! ```text
//! 0   signature "UEFI"     4  length (u32, whole table)
//! 8   ACPI header remainder (revision, checksum, OEM ids, creator)
//! 36  identifier GUID (16 bytes, EFI mixed-endian)
//! 52  data_offset (u16, from table start)
//! 54  variable name (8 ASCII bytes, NUL padded)
//! 62  ... payload at data_offset
//! ```

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Buf;
use tracing::debug;
use uuid::Uuid;

use crate::capability::{Capability, CAPABILITY_SIZE};
use crate::error::{Error, Result};

/// File name prefix of UEFI ACPI tables.
pub const UEFI_TABLE_PREFIX: &str = "UEFI";

/// Bytes of header preceding any payload.
pub const UEFI_TABLE_HEADER_LEN: usize = 62;

const IDENTIFIER_OFFSET: usize = 36;
const NAME_LEN: usize = 8;

/// Parsed header of a UEFI ACPI table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UefiTableHeader {
    pub length: u32,
    /// GUID bytes exactly as stored (mixed-endian)
    pub identifier: [u8; 16],
    pub data_offset: u16,
    pub name: [u8; NAME_LEN],
}

impl UefiTableHeader {
    /// Parse the fixed header from the start of a table.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < UEFI_TABLE_HEADER_LEN {
            return None;
        }
        let length = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);

        let mut buf = &raw[IDENTIFIER_OFFSET..UEFI_TABLE_HEADER_LEN];
        let mut identifier = [0u8; 16];
        buf.copy_to_slice(&mut identifier);
        let data_offset = buf.get_u16_le();
        let mut name = [0u8; NAME_LEN];
        buf.copy_to_slice(&mut name);

        Some(Self {
            length,
            identifier,
            data_offset,
            name,
        })
    }

    /// Whether the embedded name starts with `variable`.
    pub fn name_matches(&self, variable: &str) -> bool {
        self.name.starts_with(variable.as_bytes())
    }

    /// Whether the identifier equals `guid` in EFI byte order.
    pub fn guid_matches(&self, guid: &Uuid) -> bool {
        self.identifier == guid.to_bytes_le()
    }

    /// Whether the declared length leaves exactly one descriptor after the header.
    pub fn holds_capability(&self) -> bool {
        let offset = self.data_offset as usize;
        offset >= UEFI_TABLE_HEADER_LEN
            && (self.length as usize).checked_sub(offset) == Some(CAPABILITY_SIZE)
    }
}

/// Scanner over the ACPI tables directory.
#[derive(Debug, Clone)]
pub struct AcpiTables {
    dir: PathBuf,
}

impl AcpiTables {
    /// Tables under `<sysfs_root>/firmware/acpi/tables`.
    pub fn new(sysfs_root: &Path) -> Self {
        Self {
            dir: sysfs_root.join("firmware").join("acpi").join("tables"),
        }
    }

    /// Find a descriptor published under any of `variables` with `guid`.
    ///
    /// The directory is read once; the first table that matches a
    /// candidate and passes length validation wins.
    pub fn find_capability(&self, variables: &[&str], guid: &Uuid) -> Option<Capability> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "ACPI tables not readable");
                return None;
            }
        };

        let mut tables: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(UEFI_TABLE_PREFIX)
            })
            .map(|entry| entry.path())
            .collect();
        tables.sort();

        tables.iter().find_map(|path| match read_table(path, variables, guid) {
            Ok(found) => found,
            Err(e) => {
                debug!(table = %path.display(), error = %e, "Skipping UEFI table");
                None
            }
        })
    }
}

fn read_table(path: &Path, variables: &[&str], guid: &Uuid) -> Result<Option<Capability>> {
    let mut file = File::open(path).map_err(|e| Error::from_io(path, e))?;

    let mut raw = [0u8; UEFI_TABLE_HEADER_LEN];
    file.read_exact(&mut raw)
        .map_err(|_| Error::malformed(path, "table shorter than UEFI header"))?;
    let header = UefiTableHeader::parse(&raw)
        .ok_or_else(|| Error::malformed(path, "unparsable UEFI header"))?;

    let matched = variables
        .iter()
        .any(|name| header.name_matches(name) && header.guid_matches(guid));
    if !matched {
        return Ok(None);
    }

    if !header.holds_capability() {
        return Err(Error::malformed(
            path,
            format!(
                "length {} with data offset {} does not hold a capability descriptor",
                header.length, header.data_offset
            ),
        ));
    }

    file.seek(SeekFrom::Start(header.data_offset as u64))?;
    let mut data = [0u8; CAPABILITY_SIZE];
    file.read_exact(&mut data)
        .map_err(|_| Error::malformed(path, "payload truncated"))?;

    Ok(Capability::from_bytes(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::efi::VENDOR_GUID;
    use crate::testutil::TempTree;

    fn table(name: &str, guid: &Uuid, data_offset: u16, length: u32, payload: &[u8]) -> Vec<u8> {
        let mut raw = vec![0u8; data_offset as usize];
        raw[0..4].copy_from_slice(b"UEFI");
        raw[4..8].copy_from_slice(&length.to_le_bytes());
        raw[36..52].copy_from_slice(&guid.to_bytes_le());
        raw[52..54].copy_from_slice(&data_offset.to_le_bytes());
        raw[54..54 + name.len()].copy_from_slice(name.as_bytes());
        raw.extend_from_slice(payload);
        raw
    }

    fn valid_table(name: &str, cap: &Capability) -> Vec<u8> {
        let offset = UEFI_TABLE_HEADER_LEN as u16 + 2;
        table(name, &VENDOR_GUID, offset, offset as u32 + CAPABILITY_SIZE as u32, &cap.to_bytes())
    }

    #[test]
    fn test_header_parse() {
        let raw = valid_table("RstSataV", &Capability::platform_test(false));
        let header = UefiTableHeader::parse(&raw).unwrap();
        assert_eq!(header.data_offset, 64);
        assert_eq!(header.length, 64 + CAPABILITY_SIZE as u32);
        assert!(header.name_matches("RstSataV"));
        assert!(!header.name_matches("RstScuV"));
        assert!(header.guid_matches(&VENDOR_GUID));
        assert!(header.holds_capability());
        assert!(UefiTableHeader::parse(&raw[..40]).is_none());
    }

    #[test]
    fn test_finds_matching_table() {
        let tree = TempTree::new();
        let cap = Capability::platform_test(true);
        tree.write("firmware/acpi/tables/DSDT", b"not a uefi table");
        tree.write(
            "firmware/acpi/tables/UEFI",
            &valid_table("RstScuV", &Capability::nvme_compat()),
        );
        tree.write("firmware/acpi/tables/UEFI1", &valid_table("RsttSatV", &cap));

        let tables = AcpiTables::new(tree.root());
        assert_eq!(
            tables.find_capability(&SATA, &VENDOR_GUID),
            Some(cap)
        );
    }

    const SATA: [&str; 3] = ["RstSataV", "RstsSatV", "RsttSatV"];

    #[test]
    fn test_rejects_wrong_guid() {
        let tree = TempTree::new();
        let other = Uuid::from_fields(1, 2, 3, &[4, 5, 6, 7, 8, 9, 10, 11]);
        let cap = Capability::platform_test(false);
        let offset = UEFI_TABLE_HEADER_LEN as u16;
        tree.write(
            "firmware/acpi/tables/UEFI",
            &table(
                "RstSataV",
                &other,
                offset,
                offset as u32 + CAPABILITY_SIZE as u32,
                &cap.to_bytes(),
            ),
        );

        assert_eq!(AcpiTables::new(tree.root()).find_capability(&SATA, &VENDOR_GUID), None);
    }

    #[test]
    fn test_rejects_inconsistent_length() {
        let tree = TempTree::new();
        let cap = Capability::platform_test(false);
        let offset = UEFI_TABLE_HEADER_LEN as u16;
        tree.write(
            "firmware/acpi/tables/UEFI",
            &table("RstSataV", &VENDOR_GUID, offset, offset as u32 + 40, &cap.to_bytes()),
        );

        assert_eq!(AcpiTables::new(tree.root()).find_capability(&SATA, &VENDOR_GUID), None);
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let tree = TempTree::new();
        let cap = Capability::platform_test(false);
        let offset = UEFI_TABLE_HEADER_LEN as u16;
        tree.write(
            "firmware/acpi/tables/UEFI",
            &table(
                "RstSataV",
                &VENDOR_GUID,
                offset,
                offset as u32 + CAPABILITY_SIZE as u32,
                &cap.to_bytes()[..10],
            ),
        );

        assert_eq!(AcpiTables::new(tree.root()).find_capability(&SATA, &VENDOR_GUID), None);
    }

    #[test]
    fn test_missing_directory() {
        let tree = TempTree::new();
        assert_eq!(AcpiTables::new(tree.root()).find_capability(&SATA, &VENDOR_GUID), None);
    }
}
