//! Sysfs Probe Utilities
//!
//! Thin read helpers over the kernel device model exposed under `/sys`.
//! Every other discovery component goes through these, so the sysfs root
//! is always a parameter and never hard-coded below this module.
//!
//! # Attributes
//!
//! PCI devices expose their identity as one-line text attributes:
//!
//! ```text
//! /sys/bus/pci/devices/0000:00:17.0/vendor   0x8086
//! /sys/bus/pci/devices/0000:00:17.0/device   0x2822
//! /sys/bus/pci/devices/0000:00:17.0/class    0x010400
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default location of sysfs.
pub const SYSFS_ROOT: &str = "/sys";

/// PCI class code of a RAID bus controller.
pub const PCI_CLASS_RAID_CONTROLLER: u32 = 0x010400;

/// Read a text attribute, trimming the trailing newline.
pub fn read_attribute(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| Error::from_io(path, e))?;
    Ok(raw.trim().to_string())
}

/// Parse a hexadecimal number, with or without a `0x` prefix.
pub fn parse_hex(value: &str) -> Option<u64> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Read a hexadecimal numeric attribute.
pub fn read_hex_attribute(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let value = read_attribute(path)?;
    parse_hex(&value).ok_or_else(|| Error::AttributeParse {
        path: path.to_path_buf(),
        value,
    })
}

/// Read the `<name>` attribute of the device at `device_path`.
pub fn device_attribute(device_path: &Path, name: &str) -> Result<u64> {
    read_hex_attribute(device_path.join(name))
}

/// Read a 16-bit PCI id attribute; wider values are malformed.
fn pci_id_attribute(device_path: &Path, name: &str) -> Result<u16> {
    let value = device_attribute(device_path, name)?;
    u16::try_from(value).map_err(|_| Error::AttributeParse {
        path: device_path.join(name),
        value: format!("{:#x}", value),
    })
}

/// PCI vendor id of a device.
pub fn vendor_id(device_path: &Path) -> Result<u16> {
    pci_id_attribute(device_path, "vendor")
}

/// PCI device id of a device.
pub fn device_id(device_path: &Path) -> Result<u16> {
    pci_id_attribute(device_path, "device")
}

/// 24-bit PCI class code of a device.
pub fn class_code(device_path: &Path) -> Result<u32> {
    device_attribute(device_path, "class").map(|v| (v & 0x00ff_ffff) as u32)
}

/// Check that `<device_path>/subsystem` is a link into the given bus.
///
/// Driver directories also hold `bind`, `unbind`, `module` and friends;
/// only real devices carry a subsystem link.
pub fn subsystem_matches(device_path: &Path, bus: &str) -> bool {
    let Ok(target) = fs::read_link(device_path.join("subsystem")) else {
        return false;
    };
    target
        .file_name()
        .map(|name| name.to_string_lossy().starts_with(bus))
        .unwrap_or(false)
}

/// Canonical path of an existing sysfs node.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    fs::canonicalize(path).map_err(|e| Error::from_io(path, e))
}

/// Last component of a device path, e.g. `0000:00:17.0`.
pub fn last_segment(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory of a driver's bound devices.
pub fn driver_dir(sysfs_root: &Path, bus: &str, driver: &str) -> PathBuf {
    sysfs_root.join("bus").join(bus).join("drivers").join(driver)
}

/// Directory whose presence marks an EFI boot.
pub fn efi_dir(sysfs_root: &Path) -> PathBuf {
    sysfs_root.join("firmware").join("efi")
}

/// Whether the system was booted through EFI firmware.
pub fn is_efi_boot(sysfs_root: &Path) -> bool {
    efi_dir(sysfs_root).is_dir()
}
