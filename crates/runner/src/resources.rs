// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host resource detection.
//!
//! CPU/memory/disk/GPU probes are best-effort and OS-specific; anything
//! that cannot be measured reports zero rather than failing startup.
//! Public IPs come from a rotating list of external echo services with a
//! short per-call timeout.

use borg_core::event::ResourceDelta;
use borg_core::{GpuInfo, ResourceSnapshot};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Echo services queried for the public IP, in rotation.
const IP_ECHO_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
];

/// Per-call timeout for IP echo requests.
const IP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Collect a full snapshot. Never fails; unknown values are zero/empty.
pub async fn detect(work_dir: &Path) -> ResourceSnapshot {
    let (disk_space_gb, total_disk_space_gb) = disk_space(work_dir);
    ResourceSnapshot {
        cpu_cores: cpu_cores(),
        cpu_model: cpu_model(),
        cpu_frequency_mhz: cpu_frequency_mhz(),
        memory_gb: memory_gb(),
        disk_space_gb,
        total_disk_space_gb,
        os_version: os_version(),
        gpu_info: gpus(),
        public_ips: public_ips().await,
    }
}

/// The partial refresh piggybacked on heartbeats.
pub async fn delta(work_dir: &Path) -> ResourceDelta {
    let (free, total) = disk_space(work_dir);
    ResourceDelta {
        disk_space_gb: Some(free),
        total_disk_space_gb: Some(total),
        memory_gb: Some(memory_gb()),
        public_ips: Some(public_ips().await),
    }
}

fn cpu_cores() -> i32 {
    std::thread::available_parallelism().map(|n| n.get() as i32).unwrap_or(0)
}

fn cpu_model() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(text) = std::fs::read_to_string("/proc/cpuinfo") {
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("model name") {
                    if let Some((_, v)) = rest.split_once(':') {
                        return v.trim().to_string();
                    }
                }
            }
        }
        String::new()
    }
    #[cfg(not(target_os = "linux"))]
    {
        String::new()
    }
}

fn cpu_frequency_mhz() -> i32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(text) = std::fs::read_to_string("/proc/cpuinfo") {
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("cpu MHz") {
                    if let Some((_, v)) = rest.split_once(':') {
                        if let Ok(mhz) = v.trim().parse::<f64>() {
                            return mhz as i32;
                        }
                    }
                }
            }
        }
        0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

fn memory_gb() -> f64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(text) = std::fs::read_to_string("/proc/meminfo") {
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("MemTotal:") {
                    let kb: f64 = rest
                        .trim()
                        .trim_end_matches(" kB")
                        .trim()
                        .parse()
                        .unwrap_or(0.0);
                    return kb / 1024.0 / 1024.0;
                }
            }
        }
        0.0
    }
    #[cfg(not(target_os = "linux"))]
    {
        0.0
    }
}

/// Free and total space of the filesystem holding the work directory.
fn disk_space(_work_dir: &Path) -> (f64, f64) {
    #[cfg(unix)]
    {
        // `df -Pk` is portable across Linux and macOS.
        let out = std::process::Command::new("df")
            .args(["-Pk", &_work_dir.to_string_lossy()])
            .output();
        if let Ok(out) = out {
            if out.status.success() {
                let text = String::from_utf8_lossy(&out.stdout);
                if let Some(line) = text.lines().nth(1) {
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() >= 4 {
                        let total_kb: f64 = fields[1].parse().unwrap_or(0.0);
                        let free_kb: f64 = fields[3].parse().unwrap_or(0.0);
                        return (free_kb / 1024.0 / 1024.0, total_kb / 1024.0 / 1024.0);
                    }
                }
            }
        }
        (0.0, 0.0)
    }
    #[cfg(not(unix))]
    {
        (0.0, 0.0)
    }
}

fn os_version() -> String {
    let arch = std::env::consts::ARCH;
    #[cfg(target_os = "linux")]
    {
        let release = std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|text| {
                text.lines()
                    .find_map(|l| l.strip_prefix("PRETTY_NAME=").map(|v| v.trim_matches('"').to_string()))
            })
            .unwrap_or_else(|| "linux".to_string());
        format!("{release} ({arch})")
    }
    #[cfg(not(target_os = "linux"))]
    {
        format!("{} ({arch})", std::env::consts::OS)
    }
}

fn gpus() -> Vec<GpuInfo> {
    // nvidia-smi is the one broadly scriptable probe; absence is normal.
    let out = std::process::Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total,driver_version", "--format=csv,noheader,nounits"])
        .output();
    let Ok(out) = out else {
        return Vec::new();
    };
    if !out.status.success() {
        return Vec::new();
    }
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
            if fields.len() < 2 {
                return None;
            }
            Some(GpuInfo {
                name: fields[0].to_string(),
                memory_gb: fields[1].parse::<f64>().unwrap_or(0.0) / 1024.0,
                driver: fields.get(2).map(|d| d.to_string()),
            })
        })
        .collect()
}

/// Query the echo services until one answers; dedupe the results.
pub async fn public_ips() -> Vec<String> {
    let client = match reqwest::Client::builder().timeout(IP_PROBE_TIMEOUT).build() {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut ips = Vec::new();
    for service in IP_ECHO_SERVICES {
        match client.get(*service).send().await {
            Ok(resp) => {
                if let Ok(text) = resp.text().await {
                    let ip = text.trim().to_string();
                    if !ip.is_empty() && ip.parse::<std::net::IpAddr>().is_ok() {
                        if !ips.contains(&ip) {
                            ips.push(ip);
                        }
                        break;
                    }
                }
            }
            Err(e) => debug!(service, %e, "public ip probe failed, rotating"),
        }
    }
    ips
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
