//! EFI Variable Reader
//!
//! Intel RST/VROC EFI drivers publish the capability descriptor as a
//! vendor-GUID scoped variable. Linux exposes variables through two
//! interfaces:
//!
//! ```text
//! efivarfs (preferred)  /sys/firmware/efi/efivars/<Name>-<guid>
//!                       4 attribute bytes followed by the payload
//! sysfs-efivars         /sys/firmware/efi/vars/<Name>-<guid>/size   (hex)
//!                       /sys/firmware/efi/vars/<Name>-<guid>/data
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::capability::{Capability, CAPABILITY_SIZE};
use crate::error::{Error, Result};
use crate::sysfs;

/// GUID scoping the Intel RAID capability variables.
pub const VENDOR_GUID: Uuid = Uuid::from_fields(
    0x193d_fefa,
    0xa445,
    0x4302,
    &[0x99, 0xd8, 0xef, 0x3a, 0xad, 0x1a, 0x04, 0xc6],
);

/// Variable describing the SAS (SCU) controller.
pub const SCU_VARIABLE: &str = "RstScuV";
/// Variables describing the primary, secondary and tertiary SATA domains.
pub const SATA_VARIABLES: [&str; 3] = ["RstSataV", "RstsSatV", "RsttSatV"];
/// VMD variables, current generation first.
pub const VMD_VARIABLES: [&str; 2] = ["RstUefiV", "RstVmdV"];

/// Length of the attribute word that prefixes efivarfs payloads.
const EFIVARFS_ATTR_LEN: usize = 4;

/// Reader over both EFI variable interfaces.
#[derive(Debug, Clone)]
pub struct EfiVariables {
    efivarfs_dir: PathBuf,
    legacy_dir: PathBuf,
}

impl EfiVariables {
    /// Variables under `<sysfs_root>/firmware/efi`.
    pub fn new(sysfs_root: &Path) -> Self {
        let efi = sysfs::efi_dir(sysfs_root);
        Self {
            efivarfs_dir: efi.join("efivars"),
            legacy_dir: efi.join("vars"),
        }
    }

    /// Read `len` payload bytes of a variable, preferring efivarfs.
    pub fn read(&self, name: &str, guid: &Uuid, len: usize) -> Result<Vec<u8>> {
        match self.read_efivarfs(name, guid, len) {
            Ok(data) => Ok(data),
            Err(e) => {
                debug!(variable = name, error = %e, "efivarfs read failed, trying sysfs-efivars");
                self.read_legacy(name, guid, len)
            }
        }
    }

    /// Read through efivarfs, discarding the attribute word.
    pub fn read_efivarfs(&self, name: &str, guid: &Uuid, len: usize) -> Result<Vec<u8>> {
        let path = self.efivarfs_dir.join(variable_file_name(name, guid));
        let raw = fs::read(&path).map_err(|e| Error::from_io(&path, e))?;

        let payload = raw.get(EFIVARFS_ATTR_LEN..).unwrap_or_default();
        if payload.len() < len {
            return Err(Error::malformed(
                &path,
                format!("payload is {} bytes, expected {}", payload.len(), len),
            ));
        }
        Ok(payload[..len].to_vec())
    }

    /// Read through the legacy sysfs-efivars `size` and `data` files.
    pub fn read_legacy(&self, name: &str, guid: &Uuid, len: usize) -> Result<Vec<u8>> {
        let dir = self.legacy_dir.join(variable_file_name(name, guid));

        let size_path = dir.join("size");
        let declared = sysfs::read_hex_attribute(&size_path)?;
        if declared != len as u64 {
            return Err(Error::malformed(
                &size_path,
                format!("declared size {} does not match {}", declared, len),
            ));
        }

        let data_path = dir.join("data");
        let data = fs::read(&data_path).map_err(|e| Error::from_io(&data_path, e))?;
        if data.len() != len {
            return Err(Error::malformed(
                &data_path,
                format!("data is {} bytes, expected {}", data.len(), len),
            ));
        }
        Ok(data)
    }

    /// Decode the capability descriptor stored in variable `name`.
    pub fn read_capability(&self, name: &str, guid: &Uuid) -> Option<Capability> {
        match self.read(name, guid, CAPABILITY_SIZE) {
            Ok(data) => Capability::from_bytes(&data),
            Err(e) => {
                debug!(variable = name, error = %e, "EFI capability variable unavailable");
                None
            }
        }
    }
}

/// `<Name>-<guid>` as used by both interfaces.
pub fn variable_file_name(name: &str, guid: &Uuid) -> String {
    format!("{}-{}", name, guid.hyphenated())
}
