//! Console rendering of fleet snapshots
//!
//! Plain text table for humans, one JSON object per line for tooling.

use crate::device::DeviceRecord;
use crate::registry::{FleetSnapshot, FleetStatistics};
use chrono::{DateTime, Local};
use serde::Serialize;

const NAME_WIDTH: usize = 16;
const ADDRESS_WIDTH: usize = 15;

/// Pad or truncate a string to exactly the given width (in chars)
fn pad_or_truncate(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len <= width {
        format!("{:<width$}", s, width = width)
    } else if width > 3 {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.chars().take(width).collect()
    }
}

/// Latency column: `12.3 ms (Good)`, `timeout`, or `-`
pub fn format_latency(record: &DeviceRecord) -> String {
    match record.latency_ms {
        Some(ms) if ms >= 0.0 => format!("{:.1} ms ({})", ms, record.latency_class),
        Some(_) => "timeout".to_string(),
        None => "-".to_string(),
    }
}

/// One table row for a device
pub fn format_device_line(record: &DeviceRecord, now: DateTime<Local>) -> String {
    format!(
        "{} {} {:<7} {:>8} {}  {}  {}",
        pad_or_truncate(&record.name, NAME_WIDTH),
        pad_or_truncate(&record.address.to_string(), ADDRESS_WIDTH),
        record.status_label(),
        record.heartbeat_count,
        record.last_heartbeat.format("%H:%M:%S"),
        record.format_uptime(now),
        format_latency(record),
    )
}

pub fn format_statistics(stats: &FleetStatistics) -> String {
    format!(
        "{} device(s): {} online, {} offline",
        stats.total, stats.online, stats.offline
    )
}

/// Full status table, header first, summary last
pub fn render_table(snapshot: &FleetSnapshot) -> String {
    let mut out = format!(
        "{} {} {:<7} {:>8} {:<8}  {:<8}  {}\n",
        pad_or_truncate("NAME", NAME_WIDTH),
        pad_or_truncate("ADDRESS", ADDRESS_WIDTH),
        "STATUS",
        "BEATS",
        "LAST",
        "UPTIME",
        "LATENCY",
    );

    for record in &snapshot.devices {
        out.push_str(&format_device_line(record, snapshot.taken_at));
        out.push('\n');
    }

    out.push_str(&format_statistics(&snapshot.statistics()));
    out
}

#[derive(Serialize)]
struct SnapshotLine<'a> {
    taken_at: DateTime<Local>,
    #[serde(flatten)]
    statistics: FleetStatistics,
    devices: &'a [DeviceRecord],
}

/// Snapshot as a single-line JSON object
pub fn render_json(snapshot: &FleetSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(&SnapshotLine {
        taken_at: snapshot.taken_at,
        statistics: snapshot.statistics(),
        devices: &snapshot.devices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKey, LatencyClass};
    use chrono::TimeDelta;

    fn record(name: &str, online: bool, latency_ms: Option<f64>) -> DeviceRecord {
        let t0 = Local::now();
        let mut record = DeviceRecord::new(&DeviceKey::new(name, "192.168.0.43".parse().unwrap()), t0);
        record.record_heartbeat(t0);
        record.is_online = online;
        if let Some(ms) = latency_ms {
            record.record_latency(ms);
        }
        record
    }

    #[test]
    fn test_pad_or_truncate() {
        assert_eq!(pad_or_truncate("abc", 5), "abc  ");
        assert_eq!(pad_or_truncate("abcdefgh", 6), "abc...");
        assert_eq!(pad_or_truncate("abcdef", 2), "ab");
        assert_eq!(pad_or_truncate("Würfel-Würfel", 8), "Würfe...");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(&record("A", true, None)), "-");
        assert_eq!(format_latency(&record("A", true, Some(-1.0))), "timeout");
        assert_eq!(
            format_latency(&record("A", true, Some(12.34))),
            "12.3 ms (Good)"
        );
    }

    #[test]
    fn test_device_line_contents() {
        let r = record("Cube43", true, Some(80.0));
        let line = format_device_line(&r, r.first_seen + TimeDelta::seconds(3725));

        assert!(line.starts_with("Cube43"));
        assert!(line.contains("192.168.0.43"));
        assert!(line.contains("ONLINE"));
        assert!(line.contains("01:02:05"));
        assert!(line.contains("(Fair)"));
        assert_eq!(r.latency_class, LatencyClass::Fair);
    }

    #[test]
    fn test_render_table() {
        let snapshot = FleetSnapshot {
            taken_at: Local::now(),
            devices: vec![record("A", true, None), record("B", false, None)],
        };

        let table = render_table(&snapshot);
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].contains("OFFLINE"));
        assert_eq!(lines[3], "2 device(s): 1 online, 1 offline");
    }

    #[test]
    fn test_render_empty_table() {
        let snapshot = FleetSnapshot {
            taken_at: Local::now(),
            devices: vec![],
        };

        assert!(render_table(&snapshot).ends_with("0 device(s): 0 online, 0 offline"));
    }

    #[test]
    fn test_render_json() {
        let snapshot = FleetSnapshot {
            taken_at: Local::now(),
            devices: vec![record("Cube43", true, Some(20.0))],
        };

        let json = render_json(&snapshot).unwrap();
        assert!(!json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["online"], 1);
        assert_eq!(value["devices"][0]["name"], "Cube43");
        assert_eq!(value["devices"][0]["latency_class"], "Good");
    }
}
