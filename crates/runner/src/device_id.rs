// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable device identity.
//!
//! The device id is the SHA-256 of `|`-joined, tag-prefixed hardware
//! identifiers collected by best-effort OS probes. Each probe is a small
//! trait object so tests can inject deterministic identifiers; the
//! concatenation and hash are pure. The result is cached under the work
//! directory so reinstalls of the agent keep their identity.

use borg_core::DeviceId;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Cache file name under the work directory.
pub const CACHE_FILE: &str = ".device_id";

/// Errors from device-id derivation.
#[derive(Debug, Error)]
pub enum DeviceIdError {
    #[error("no hardware identifiers could be collected")]
    Unavailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One best-effort hardware identifier source.
///
/// `collect` returns the raw identifier value without its tag; empty or
/// failed probes are skipped.
pub trait IdentifierProbe: Send + Sync {
    /// Tag prefixed to the value in the hash input (`cpu`, `uuid`, `mac`,
    /// `machine`, `serial`).
    fn tag(&self) -> &'static str;
    fn collect(&self) -> Option<String>;
}

/// Pure derivation step: tag, join, hash.
pub fn derive(probes: &[Box<dyn IdentifierProbe>]) -> Result<DeviceId, DeviceIdError> {
    let mut parts = Vec::new();
    for probe in probes {
        match probe.collect() {
            Some(value) if !value.trim().is_empty() => {
                parts.push(format!("{}:{}", probe.tag(), value.trim()));
            }
            _ => debug!(tag = probe.tag(), "device-id probe yielded nothing"),
        }
    }
    if parts.is_empty() {
        return Err(DeviceIdError::Unavailable);
    }

    let joined = parts.join("|");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    Ok(DeviceId::new(format!("{:x}", hasher.finalize())))
}

/// Load from cache or derive-and-cache.
///
/// The cache wins only when it holds a canonical 64-char hex string;
/// anything else is treated as absent and rewritten.
pub fn load_or_derive(
    work_dir: &Path,
    probes: &[Box<dyn IdentifierProbe>],
) -> Result<DeviceId, DeviceIdError> {
    let cache = cache_path(work_dir);
    if let Some(cached) = read_cache(&cache) {
        debug!(path = %cache.display(), "device id loaded from cache");
        return Ok(cached);
    }

    let id = derive(probes)?;
    if let Err(e) = write_cache(&cache, &id) {
        warn!(%e, path = %cache.display(), "cannot cache device id");
    }
    Ok(id)
}

pub fn cache_path(work_dir: &Path) -> PathBuf {
    work_dir.join(CACHE_FILE)
}

fn read_cache(path: &Path) -> Option<DeviceId> {
    let text = std::fs::read_to_string(path).ok()?;
    let id = DeviceId::new(text.trim());
    id.is_canonical().then_some(id)
}

fn write_cache(path: &Path, id: &DeviceId) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, id.as_str())
}

/// The platform probe set, in hash order: CPU model, system UUID,
/// primary MAC, machine id, BIOS serial.
pub fn platform_probes() -> Vec<Box<dyn IdentifierProbe>> {
    vec![
        Box::new(CpuModelProbe),
        Box::new(SystemUuidProbe),
        Box::new(PrimaryMacProbe),
        Box::new(MachineIdProbe),
        Box::new(BiosSerialProbe),
    ]
}

/// CPU model string.
struct CpuModelProbe;

impl IdentifierProbe for CpuModelProbe {
    fn tag(&self) -> &'static str {
        "cpu"
    }

    fn collect(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            let text = std::fs::read_to_string("/proc/cpuinfo").ok()?;
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("model name") {
                    return rest.split_once(':').map(|(_, v)| v.trim().to_string());
                }
            }
            None
        }
        #[cfg(target_os = "macos")]
        {
            command_line("sysctl", &["-n", "machdep.cpu.brand_string"])
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            std::env::var("PROCESSOR_IDENTIFIER").ok()
        }
    }
}

/// DMI product UUID (Linux), IOPlatformUUID (macOS).
struct SystemUuidProbe;

impl IdentifierProbe for SystemUuidProbe {
    fn tag(&self) -> &'static str {
        "uuid"
    }

    fn collect(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/sys/class/dmi/id/product_uuid")
                .ok()
                .map(|s| s.trim().to_string())
        }
        #[cfg(target_os = "macos")]
        {
            let out = command_line("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
            out.lines()
                .find(|l| l.contains("IOPlatformUUID"))
                .and_then(|l| l.split('"').nth(3))
                .map(|s| s.to_string())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }
}

/// First non-virtual, non-loopback MAC address.
struct PrimaryMacProbe;

impl IdentifierProbe for PrimaryMacProbe {
    fn tag(&self) -> &'static str {
        "mac"
    }

    fn collect(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            let entries = std::fs::read_dir("/sys/class/net").ok()?;
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| !is_virtual_interface(name))
                .collect();
            names.sort();
            for name in names {
                let path = format!("/sys/class/net/{name}/address");
                if let Ok(mac) = std::fs::read_to_string(path) {
                    let mac = mac.trim();
                    if !mac.is_empty() && mac != "00:00:00:00:00:00" {
                        return Some(mac.to_string());
                    }
                }
            }
            None
        }
        #[cfg(target_os = "macos")]
        {
            let out = command_line("ifconfig", &["en0"])?;
            out.lines()
                .find_map(|l| l.trim().strip_prefix("ether "))
                .map(|s| s.trim().to_string())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }
}

/// `/etc/machine-id` (Linux) or the registry MachineGuid elsewhere.
struct MachineIdProbe;

impl IdentifierProbe for MachineIdProbe {
    fn tag(&self) -> &'static str {
        "machine"
    }

    fn collect(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/etc/machine-id").ok().map(|s| s.trim().to_string())
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }
}

/// BIOS serial number.
struct BiosSerialProbe;

impl IdentifierProbe for BiosSerialProbe {
    fn tag(&self) -> &'static str {
        "serial"
    }

    fn collect(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/sys/class/dmi/id/board_serial")
                .ok()
                .map(|s| s.trim().to_string())
        }
        #[cfg(target_os = "macos")]
        {
            let out = command_line("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
            out.lines()
                .find(|l| l.contains("IOPlatformSerialNumber"))
                .and_then(|l| l.split('"').nth(3))
                .map(|s| s.to_string())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }
}

/// Interfaces excluded from MAC selection.
#[cfg(target_os = "linux")]
fn is_virtual_interface(name: &str) -> bool {
    name == "lo"
        || name.starts_with("docker")
        || name.starts_with("veth")
        || name.starts_with("br-")
        || name.starts_with("virbr")
        || name.starts_with("tun")
        || name.starts_with("tap")
}

#[cfg(target_os = "macos")]
fn command_line(program: &str, args: &[&str]) -> Option<String> {
    let out = std::process::Command::new(program).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Fixed-value probe for tests.
#[cfg(test)]
pub struct FakeProbe {
    pub tag: &'static str,
    pub value: Option<String>,
}

#[cfg(test)]
impl IdentifierProbe for FakeProbe {
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn collect(&self) -> Option<String> {
        self.value.clone()
    }
}

#[cfg(test)]
#[path = "device_id_tests.rs"]
mod tests;
