//! Human-readable rendering of byte counts, ratios and durations.

use std::time::Duration;

/// Format a byte count with binary prefixes (e.g. `"7.3 GiB"`).
pub fn format_bytes(bytes: u64) -> String {
    const TIB: u64 = 1 << 40;
    const GIB: u64 = 1 << 30;
    const MIB: u64 = 1 << 20;
    const KIB: u64 = 1 << 10;

    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// A ratio as a percentage with one decimal, `0.123` → `"12.3%"`.
pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// `HH:MM:SS`, hours unbounded.
pub fn clock_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}

pub fn load_average(load: &[f64; 3]) -> String {
    load.iter()
        .map(|l| format!("{l:.2}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! format_tests {
        ($($name:ident: $value:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let (actual, expected): (String, &str) = $value;
                    assert_eq!(actual, expected, stringify!($name));
                }
            )*
        }
    }

    format_tests! {
        bytes_zero: (format_bytes(0), "0 B"),
        bytes_below_kib: (format_bytes(1023), "1023 B"),
        bytes_kib: (format_bytes(1536), "1.5 KiB"),
        bytes_mib: (format_bytes(512 * 1024 * 1024), "512.0 MiB"),
        bytes_gib: (format_bytes(8 * 1024 * 1024 * 1024), "8.0 GiB"),
        bytes_tib: (format_bytes(3 << 40), "3.0 TiB"),
        percent_fraction: (percent(0.1234), "12.3%"),
        percent_over_one: (percent(1.75), "175.0%"),
        percent_zero: (percent(0.0), "0.0%"),
        time_zero: (clock_time(Duration::ZERO), "00:00:00"),
        time_minutes: (clock_time(Duration::from_millis(65_999)), "00:01:05"),
        time_hours: (clock_time(Duration::from_secs(37 * 3600 + 61)), "37:01:01"),
        loadavg: (load_average(&[0.5, 1.0, 12.346]), "0.50, 1.00, 12.35"),
    }

    #[test]
    fn rounding_drops_float_noise() {
        assert_eq!(round_to(0.1 + 0.2, 4), 0.3);
        assert_eq!(round_to(0.123_456, 4), 0.1235);
        assert_eq!(round_to(1.0, 4), 1.0);
    }
}
