//! Static host facts read from `/proc` and `/etc/os-release`.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::model::HostInfo;

const UNKNOWN: &str = "unknown";

/// CPU model from `/proc/cpuinfo` text.
pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

/// `MemTotal` from `/proc/meminfo` text, in bytes.
pub fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo_field(meminfo, "MemTotal")
}

/// A `/proc/meminfo` field, converted from kB to bytes.
pub fn meminfo_field(meminfo: &str, field: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let (key, rest) = line.split_once(':')?;
        if key.trim() != field {
            return None;
        }
        let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
        Some(kb * 1024)
    })
}

/// Distro name, version and codename from `os-release` text.
pub fn parse_os_release(text: &str) -> (Option<String>, Option<String>, Option<String>) {
    let value = |key: &str| {
        text.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
        })
    };
    (
        value("NAME"),
        value("VERSION_ID"),
        value("VERSION_CODENAME"),
    )
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Host file unreadable");
        String::new()
    })
}

/// Probe the running host. Anything unreadable reads as `"unknown"` (or `0`
/// for memory).
pub fn probe() -> HostInfo {
    let cpuinfo = read(Path::new("/proc/cpuinfo"));
    let meminfo = read(Path::new("/proc/meminfo"));
    let os_release = read(Path::new("/etc/os-release"));
    let (distro, version, codename) = parse_os_release(&os_release);
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN.to_string());
    HostInfo {
        cpu: or_unknown(parse_cpu_model(&cpuinfo)),
        memory: parse_mem_total(&meminfo).unwrap_or(0),
        os_distro: or_unknown(distro),
        os_version: or_unknown(version),
        os_codename: or_unknown(codename),
    }
}
