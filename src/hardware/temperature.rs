// src/hardware/temperature.rs
use crate::config::WizardConfig;
use crate::models::Spool;
use crate::wizard::session::WizardSession;

/// Decides whether the hotend is warm enough for a nozzle operation: anything above
/// `wanted - tolerance` passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureGate {
    default_hotend_temperature: f64,
    tolerance: f64,
}

impl TemperatureGate {
    pub fn new(default_hotend_temperature: f64, tolerance: f64) -> Self {
        Self {
            default_hotend_temperature,
            tolerance,
        }
    }

    pub fn from_config(config: &WizardConfig) -> Self {
        Self::new(config.default_hotend_temperature, config.temperature_tolerance)
    }

    /// Default hotend temperature shifted by the spool's offset, if any.
    pub fn wanted_temperature(&self, spool: Option<&Spool>) -> f64 {
        let offset = spool.and_then(|s| s.temperature_offset).unwrap_or(0.0);
        self.default_hotend_temperature + offset
    }

    /// Whether the session's hotend reading is inside the band for its current spool.
    pub fn is_ready(&self, session: &WizardSession) -> bool {
        self.passes(session.hotend_current_temp, session.spool.as_ref())
    }

    pub fn passes(&self, current: f64, spool: Option<&Spool>) -> bool {
        let wanted = self.wanted_temperature(spool);
        let ready = current > wanted - self.tolerance;
        tracing::debug!(
            "Hotend check: current={:.1}°C wanted={:.1}°C ready={}",
            current,
            wanted,
            ready
        );
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spool_with_offset(offset: Option<f64>) -> Spool {
        Spool {
            id: 7,
            name: "Prusament".to_string(),
            material: Some("PETG".to_string()),
            color: None,
            temperature_offset: offset,
        }
    }

    #[test]
    fn test_tolerance_band_is_strict() {
        let gate = TemperatureGate::new(215.0, 20.0);
        assert!(!gate.passes(190.0, None));
        assert!(!gate.passes(195.0, None));
        assert!(gate.passes(195.1, None));
        assert!(gate.passes(200.0, None));
    }

    #[test]
    fn test_spool_offset_shifts_wanted_temperature() {
        let gate = TemperatureGate::new(215.0, 20.0);
        let hot = spool_with_offset(Some(25.0));
        assert_eq!(gate.wanted_temperature(Some(&hot)), 240.0);
        assert!(!gate.passes(210.0, Some(&hot)));
        assert!(gate.passes(221.0, Some(&hot)));
        assert_eq!(gate.wanted_temperature(Some(&spool_with_offset(None))), 215.0);
    }

    #[test]
    fn test_ready_is_monotonic_in_current_temperature() {
        let gate = TemperatureGate::new(215.0, 20.0);
        let mut was_ready = false;
        for tenth in 0..3000 {
            let ready = gate.passes(f64::from(tenth) / 10.0, None);
            assert!(!(was_ready && !ready), "flipped back at {}", tenth);
            was_ready = ready;
        }
        assert!(was_ready);
    }
}
