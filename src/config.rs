/// Driver tunables.
///
/// Defaults match what the tracker expects from a DK2. `from_env()` lets
/// individual values be overridden without recompiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Sensor message rate while streaming (Hz).
    pub report_rate: u16,
    /// Sensor message rate left behind after stopping (Hz).
    pub idle_report_rate: u16,
    /// Cycle the IR LEDs through their blink patterns instead of lighting
    /// them steadily.
    pub blink: bool,
    pub low_persistence: bool,
    /// Enable frame id pixel readback for latency measurement.
    pub pixel_readback: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            report_rate: 500,
            idle_report_rate: 50,
            blink: true,
            low_persistence: true,
            pixel_readback: true,
        }
    }
}

impl DriverConfig {
    /// Defaults, overridden by `HMDTRACK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            report_rate: read_u16(&lookup, "HMDTRACK_REPORT_RATE", defaults.report_rate),
            idle_report_rate: read_u16(
                &lookup,
                "HMDTRACK_IDLE_REPORT_RATE",
                defaults.idle_report_rate,
            ),
            blink: read_bool(&lookup, "HMDTRACK_BLINK", defaults.blink),
            low_persistence: read_bool(
                &lookup,
                "HMDTRACK_LOW_PERSISTENCE",
                defaults.low_persistence,
            ),
            pixel_readback: read_bool(&lookup, "HMDTRACK_PIXEL_READBACK", defaults.pixel_readback),
        }
    }
}

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| {
            let v = v.trim().to_ascii_lowercase();
            match v.as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => {
                    log::warn!("Ignoring {}='{}', expected a boolean", name, v);
                    None
                }
            }
        })
        .unwrap_or(default)
}

fn read_u16(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u16) -> u16 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u16>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> DriverConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DriverConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]), DriverConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HMDTRACK_REPORT_RATE", " 1000 "),
            ("HMDTRACK_BLINK", "off"),
            ("HMDTRACK_PIXEL_READBACK", "No"),
        ]);
        assert_eq!(config.report_rate, 1000);
        assert_eq!(config.idle_report_rate, 50);
        assert!(!config.blink);
        assert!(!config.pixel_readback);
        assert!(config.low_persistence);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = config_from(&[
            ("HMDTRACK_IDLE_REPORT_RATE", "fast"),
            ("HMDTRACK_LOW_PERSISTENCE", "maybe"),
        ]);
        assert_eq!(config.idle_report_rate, 50);
        assert!(config.low_persistence);
    }
}
