//! Serialisable snapshot of a platform's controllers and capabilities.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capability::Capability;
use crate::hardware::Controller;

/// One controller and whatever describes it.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerReport {
    #[serde(flatten)]
    pub controller: Controller,
    pub capability: Option<Capability>,
}

/// Result of [`super::Platform::report`].
#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub generated_at: DateTime<Utc>,
    pub sysfs_root: PathBuf,
    pub controllers: Vec<ControllerReport>,
}

impl PlatformReport {
    pub fn new(sysfs_root: PathBuf, controllers: Vec<ControllerReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            sysfs_root,
            controllers,
        }
    }

    /// Only the controllers that match `dev_id`.
    pub fn filter_device(mut self, dev_id: u16) -> Self {
        self.controllers.retain(|c| c.controller.dev_id == dev_id);
        self
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl fmt::Display for PlatformReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.controllers.is_empty() {
            return writeln!(f, "No supported controllers found");
        }
        for (i, entry) in self.controllers.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let c = &entry.controller;
            writeln!(
                f,
                "{} Controller : {} (device {:04x}, class {:06x})",
                c.kind, c.pci_id, c.dev_id, c.class
            )?;
            writeln!(f, "           Path : {}", c.path.display())?;
            match &entry.capability {
                Some(cap) => writeln!(f, "{}", cap)?,
                None => writeln!(f, "     Capability : not available")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::ControllerKind;

    fn report() -> PlatformReport {
        PlatformReport::new(
            PathBuf::from("/sys"),
            vec![
                ControllerReport {
                    controller: Controller::new(
                        ControllerKind::Sata,
                        0x2822,
                        0x010400,
                        "/sys/devices/pci0000:00/0000:00:17.0",
                    ),
                    capability: Some(Capability::platform_test(false)),
                },
                ControllerReport {
                    controller: Controller::new(
                        ControllerKind::Nvme,
                        0xf1a8,
                        0x010802,
                        "/sys/devices/pci0000:00/0000:02:00.0",
                    ),
                    capability: None,
                },
            ],
        )
    }

    #[test]
    fn test_text_output() {
        let text = report().to_string();
        assert!(text.contains("SATA Controller : 0000:00:17.0 (device 2822, class 010400)"));
        assert!(text.contains("RAID Levels : raid0 raid1 raid5 raid10"));
        assert!(text.contains("Capability : not available"));
    }

    #[test]
    fn test_json_output() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["controllers"][0]["kind"], "Sata");
        assert_eq!(json["controllers"][0]["dev_id"], 0x2822);
        assert_eq!(json["controllers"][0]["capability"]["signature"], "$VER");
        assert!(json["controllers"][1]["capability"].is_null());
    }

    #[test]
    fn test_filter_and_yaml() {
        let filtered = report().filter_device(0xf1a8);
        assert_eq!(filtered.controllers.len(), 1);
        let yaml = filtered.to_yaml().unwrap();
        assert!(yaml.contains("pci_id:"));
        assert!(yaml.contains("0000:02:00.0"));
        assert_eq!(
            PlatformReport::new(PathBuf::from("/sys"), vec![]).to_string(),
            "No supported controllers found\n"
        );
    }
}
