//! Alarm settings derived from configured limits.

use empower_core::n2k::{AlarmLimit, Dc, Tank};
use empower_core::{AlarmKind, AlarmSetting};

fn collect(
    limits: &[(AlarmKind, &AlarmLimit)],
    make: fn(AlarmKind, f64) -> Option<AlarmSetting>,
) -> Vec<AlarmSetting> {
    limits
        .iter()
        .filter_map(|(kind, limit)| limit.active().and_then(|value| make(*kind, value)))
        .collect()
}

/// Enabled level limits of a tank.
pub fn tank_alarms(tank: &Tank) -> Vec<AlarmSetting> {
    collect(
        &[
            (AlarmKind::VeryLow, &tank.very_low_limit),
            (AlarmKind::Low, &tank.low_limit),
            (AlarmKind::High, &tank.high_limit),
            (AlarmKind::VeryHigh, &tank.very_high_limit),
        ],
        AlarmSetting::tank,
    )
}

/// Enabled state-of-charge and voltage limits of a DC meter.
pub fn battery_alarms(dc: &Dc) -> Vec<AlarmSetting> {
    collect(
        &[
            (AlarmKind::VeryLow, &dc.very_low_limit),
            (AlarmKind::Low, &dc.low_limit),
            (AlarmKind::High, &dc.high_limit),
            (AlarmKind::VeryHigh, &dc.very_high_limit),
            (AlarmKind::VeryLowVoltage, &dc.very_low_voltage),
            (AlarmKind::LowVoltage, &dc.low_voltage),
            (AlarmKind::HighVoltage, &dc.high_voltage),
            (AlarmKind::VeryHighVoltage, &dc.very_high_voltage),
        ],
        AlarmSetting::battery,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(value: f64) -> AlarmLimit {
        AlarmLimit {
            enabled: true,
            limit: value,
        }
    }

    #[test]
    fn test_only_enabled_limits() {
        let tank = Tank {
            low_limit: limit(15.0),
            high_limit: AlarmLimit {
                enabled: false,
                limit: 90.0,
            },
            ..Default::default()
        };

        let alarms = tank_alarms(&tank);
        assert_eq!(alarms, vec![AlarmSetting::Tank { kind: AlarmKind::Low, value: 15.0 }]);
    }

    #[test]
    fn test_battery_voltage_limits() {
        let dc = Dc {
            very_low_limit: limit(10.0),
            low_voltage: limit(11.8),
            ..Default::default()
        };

        let kinds: Vec<AlarmKind> = battery_alarms(&dc).iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AlarmKind::VeryLow, AlarmKind::LowVoltage]);
    }
}
