//! ADSR Envelopes
//!
//! [`EnvelopeModule`] is stateless: it reads attack/decay/sustain/release from
//! its parameter source each time it is applied and schedules linear ramps on
//! an automatable parameter. The release duration it returns is how callers
//! know when dependent sources may be stopped.

use crate::config::{read_clamped, ParamValue, ParameterSource, SharedSource};
use crate::graph::{ParamRef, SignalGraph};
use serde::{Deserialize, Serialize};

/// ADSR timings in seconds; `sustain` is a fraction of peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeConfig {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.7,
            release: 0.4,
        }
    }
}

impl EnvelopeConfig {
    /// Read `{prefix}.attack|decay|sustain|release`
    pub fn read(source: &dyn ParameterSource, prefix: &str) -> Self {
        Self::read_with_defaults(source, prefix, Self::default())
    }

    pub fn read_with_defaults(source: &dyn ParameterSource, prefix: &str, defaults: Self) -> Self {
        let key = |field: &str| format!("{}.{}", prefix, field);
        Self {
            attack: read_clamped(source, &key("attack"), defaults.attack, 0.0, 60.0),
            decay: read_clamped(source, &key("decay"), defaults.decay, 0.0, 60.0),
            sustain: read_clamped(source, &key("sustain"), defaults.sustain, 0.0, 1.0),
            release: read_clamped(source, &key("release"), defaults.release, 0.0, 60.0),
        }
    }

    pub fn to_params(&self, prefix: &str) -> Vec<(String, ParamValue)> {
        vec![
            (format!("{}.attack", prefix), self.attack.into()),
            (format!("{}.decay", prefix), self.decay.into()),
            (format!("{}.sustain", prefix), self.sustain.into()),
            (format!("{}.release", prefix), self.release.into()),
        ]
    }
}

/// Envelope generator bound to a configuration prefix
#[derive(Clone)]
pub struct EnvelopeModule {
    source: SharedSource,
    prefix: String,
    defaults: EnvelopeConfig,
}

impl EnvelopeModule {
    pub fn new(source: SharedSource, prefix: impl Into<String>) -> Self {
        Self::with_defaults(source, prefix, EnvelopeConfig::default())
    }

    pub fn with_defaults(
        source: SharedSource,
        prefix: impl Into<String>,
        defaults: EnvelopeConfig,
    ) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            defaults,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current configuration, read at call time
    pub fn config(&self) -> EnvelopeConfig {
        EnvelopeConfig::read_with_defaults(self.source.as_ref(), &self.prefix, self.defaults)
    }

    /// Schedule attack and decay on `target`.
    ///
    /// The value is `start_value` at `start`, reaches `peak` at
    /// `start + attack` and `peak * sustain` at `start + attack + decay`.
    pub fn apply_envelope(
        &self,
        graph: &mut SignalGraph,
        target: ParamRef,
        start: f64,
        start_value: f64,
        peak: f64,
    ) {
        let env = self.config();
        graph.cancel_scheduled_values(target, start);
        graph.set_value_at_time(target, start_value, start);
        graph.linear_ramp_to_value_at_time(target, peak, start + env.attack);
        graph.linear_ramp_to_value_at_time(target, peak * env.sustain, start + env.attack + env.decay);
    }

    /// Schedule the release on `target` and return its duration.
    ///
    /// Pending automation from `start` on is cancelled and the value reached
    /// at `start` is held before ramping to `end_value`.
    pub fn apply_release(
        &self,
        graph: &mut SignalGraph,
        target: ParamRef,
        start: f64,
        end_value: f64,
    ) -> f64 {
        let env = self.config();
        graph.cancel_and_hold_at_time(target, start);
        graph.linear_ramp_to_value_at_time(target, end_value, start + env.release);
        env.release
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use crate::nodes::Gain;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn setup(pairs: &[(&str, f64)]) -> (SignalGraph, ParamRef, EnvelopeModule) {
        let source = MapParameterSource::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)));
        let mut graph = SignalGraph::new(44100.0);
        let gain = graph.add("vca", Gain::new(0.0));
        let module = EnvelopeModule::new(Arc::new(source), "envelope");
        (graph, gain.param("gain"), module)
    }

    #[test]
    fn test_defaults_when_unset() {
        let (_, _, module) = setup(&[]);
        assert_eq!(module.config(), EnvelopeConfig::default());
    }

    #[test]
    fn test_sustain_is_clamped() {
        let (_, _, module) = setup(&[("envelope.sustain", 3.0)]);
        assert_eq!(module.config().sustain, 1.0);
    }

    #[test]
    fn test_attack_decay_shape() {
        let (mut graph, target, module) = setup(&[
            ("envelope.attack", 0.01),
            ("envelope.decay", 0.1),
            ("envelope.sustain", 0.5),
        ]);
        module.apply_envelope(&mut graph, target, 0.0, 0.0, 0.24);

        let at = |t| graph.param_value_at(target, t).unwrap();
        assert_abs_diff_eq!(at(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at(0.005), 0.12, epsilon = 1e-12);
        assert_abs_diff_eq!(at(0.01), 0.24, epsilon = 1e-12);
        assert_abs_diff_eq!(at(0.11), 0.12, epsilon = 1e-12);
        assert_abs_diff_eq!(at(5.0), 0.12, epsilon = 1e-12);
    }

    #[test]
    fn test_release_returns_duration_and_holds() {
        let (mut graph, target, module) = setup(&[
            ("envelope.attack", 1.0),
            ("envelope.release", 0.4),
        ]);
        module.apply_envelope(&mut graph, target, 0.0, 0.0, 1.0);

        let duration = module.apply_release(&mut graph, target, 0.5, 0.0);
        assert_abs_diff_eq!(duration, 0.4);

        let at = |t| graph.param_value_at(target, t).unwrap();
        // attack was halfway; the rest of it must not fire
        assert_abs_diff_eq!(at(0.5), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(at(0.7), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(at(0.9), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at(2.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_to_params_round_trip() {
        let config = EnvelopeConfig {
            attack: 0.05,
            decay: 0.3,
            sustain: 0.6,
            release: 1.2,
        };
        let source = MapParameterSource::from_pairs(config.to_params("filter"));
        assert_eq!(EnvelopeConfig::read(&source, "filter"), config);
    }
}
