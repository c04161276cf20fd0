//! Parsers for OS probe output.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use sysinfo::Disks;

const THROTTLING_OK: &str = "OK";

/// Meaning of each bit reported by `vcgencmd get_throttled`
const THROTTLING_BITS: [(u32, &str); 8] = [
    (0, "under-voltage detected"),
    (1, "arm frequency capped"),
    (2, "currently throttled"),
    (3, "soft temperature limit active"),
    (16, "under-voltage has occurred"),
    (17, "arm frequency capped has occurred"),
    (18, "throttling has occurred"),
    (19, "soft temperature limit has occurred"),
];

const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Bitmask from `throttled=0x50005`.
#[must_use]
pub fn parse_throttled(output: &str) -> Option<u32> {
    let (_, hex) = output.trim().split_once("0x")?;
    u32::from_str_radix(hex.trim(), 16).ok()
}

/// `OK` for a clear mask, otherwise `WARNING: ` and every set bit.
#[must_use]
pub fn describe_throttling(code: u32) -> String {
    if code == 0 {
        return THROTTLING_OK.to_string();
    }

    let issues: Vec<String> = (0..u32::BITS)
        .filter(|bit| code & (1 << bit) != 0)
        .map(|bit| {
            THROTTLING_BITS
                .iter()
                .find(|(known, _)| *known == bit)
                .map_or_else(|| format!("bit {bit}"), |(_, text)| (*text).to_string())
        })
        .collect();

    format!("WARNING: {}", issues.join(", "))
}

/// Value of `temp=48.3'C`.
#[must_use]
pub fn parse_temperature(output: &str) -> Option<String> {
    let (_, value) = output.trim().split_once('=')?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether `systemctl status` output reports the unit as running.
#[must_use]
pub fn service_running(status_output: &str) -> bool {
    static ACTIVE_RUNNING: OnceLock<Regex> = OnceLock::new();
    let pattern = ACTIVE_RUNNING
        .get_or_init(|| Regex::new(r"(?m)^.*Active:.*running").expect("static pattern is valid"));
    pattern.is_match(status_output)
}

/// Total and available GiB, one decimal, of the filesystem holding `path`.
#[must_use]
pub fn disk_stats(path: &Path) -> Option<(String, String)> {
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())?;

    Some((
        format_gib(disk.total_space()),
        format_gib(disk.available_space()),
    ))
}

// Byte counts lose precision only beyond 2^53 bytes
#[allow(clippy::cast_precision_loss)]
fn format_gib(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / BYTES_PER_GIB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_throttled() {
        assert_eq!(parse_throttled("throttled=0x0\n"), Some(0));
        assert_eq!(parse_throttled("throttled=0x50005"), Some(0x50005));
        assert_eq!(parse_throttled("throttled=zero"), None);
        assert_eq!(parse_throttled(""), None);
    }

    #[test]
    fn test_describe_throttling_ok() {
        assert_eq!(describe_throttling(0), "OK");
    }

    #[test]
    fn test_describe_throttling_current_and_past() {
        assert_eq!(
            describe_throttling(0x50005),
            "WARNING: under-voltage detected, currently throttled, \
             under-voltage has occurred, throttling has occurred"
        );
    }

    #[test]
    fn test_describe_throttling_single_bit() {
        assert_eq!(
            describe_throttling(0x8_0000),
            "WARNING: soft temperature limit has occurred"
        );
    }

    #[test]
    fn test_describe_throttling_unknown_bit() {
        assert_eq!(describe_throttling(0x10), "WARNING: bit 4");
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(
            parse_temperature("temp=48.3'C\n"),
            Some("48.3'C".to_string())
        );
        assert_eq!(parse_temperature("temp="), None);
        assert_eq!(parse_temperature("command not found"), None);
    }

    #[test]
    fn test_service_running() {
        let running = "● phoniebox-rfid-reader.service - RFID reader\n   \
                       Loaded: loaded (/etc/systemd/system/x.service; enabled)\n   \
                       Active: active (running) since Thu 2026-10-15 08:00:00 CEST\n";
        let stopped = "● phoniebox-rfid-reader.service - RFID reader\n   \
                       Loaded: loaded\n   \
                       Active: inactive (dead)\n";

        assert!(service_running(running));
        assert!(!service_running(stopped));
        assert!(!service_running(""));
    }

    #[test]
    fn test_format_gib() {
        assert_eq!(format_gib(0), "0.0");
        assert_eq!(format_gib(31_268_536_320), "29.1");
    }

    #[test]
    fn test_disk_stats_for_root() {
        let (total, avail) = disk_stats(Path::new("/")).unwrap();

        let total: f64 = total.parse().unwrap();
        let avail: f64 = avail.parse().unwrap();
        assert!(total > 0.0);
        assert!(avail <= total);
    }
}
