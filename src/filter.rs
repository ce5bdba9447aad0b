//! Per-Voice Filter
//!
//! Each voice gets a biquad plus an envelope path: a unity constant source
//! through a gain whose value the filter envelope automates (peak = envelope
//! amount in Hz). That gain, and any combined filter-LFO bus, are wired into
//! the biquad's `frequency` parameter, where they add to the cutoff.

use crate::config::{read_clamped, read_enum, ParamValue, ParameterSource, SharedSource};
use crate::envelope::{EnvelopeConfig, EnvelopeModule};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::modulation::ModulationBus;
use crate::nodes::{BiquadFilter, ConstantSource, FilterType, Gain};
use serde::{Deserialize, Serialize};

/// Filter envelope timings used when none are configured
pub const FILTER_ENVELOPE_DEFAULTS: EnvelopeConfig = EnvelopeConfig {
    attack: 0.05,
    decay: 0.3,
    sustain: 0.4,
    release: 0.6,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub cutoff: f64,
    pub resonance: f64,
    pub env_amount: f64,
    #[serde(flatten)]
    pub envelope: EnvelopeConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            cutoff: 2000.0,
            resonance: 1.0,
            env_amount: 1500.0,
            envelope: FILTER_ENVELOPE_DEFAULTS,
        }
    }
}

impl FilterConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            filter_type: read_enum(source, "filter.type", d.filter_type),
            cutoff: read_clamped(source, "filter.cutoff", d.cutoff, 10.0, 22_000.0),
            resonance: read_clamped(source, "filter.resonance", d.resonance, 0.0001, 30.0),
            env_amount: read_clamped(source, "filter.envAmount", d.env_amount, -20_000.0, 20_000.0),
            envelope: EnvelopeConfig::read_with_defaults(source, "filter", d.envelope),
        }
    }

    pub fn to_params(&self) -> Vec<(String, ParamValue)> {
        let mut params = vec![
            ("filter.type".to_string(), self.filter_type.as_str().into()),
            ("filter.cutoff".to_string(), self.cutoff.into()),
            ("filter.resonance".to_string(), self.resonance.into()),
            ("filter.envAmount".to_string(), self.env_amount.into()),
        ];
        params.extend(self.envelope.to_params("filter"));
        params
    }
}

/// Nodes owned by one voice's filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterInstance {
    pub filter: NodeId,
    pub env_source: NodeId,
    pub env_gain: NodeId,
}

impl FilterInstance {
    pub fn frequency(&self) -> ParamRef {
        ParamRef {
            node: self.filter,
            param: BiquadFilter::FREQUENCY,
        }
    }

    pub fn env_depth(&self) -> ParamRef {
        ParamRef {
            node: self.env_gain,
            param: Gain::GAIN,
        }
    }

    pub fn nodes(&self) -> [NodeId; 3] {
        [self.filter, self.env_source, self.env_gain]
    }
}

pub struct FilterModule {
    source: SharedSource,
    envelope: EnvelopeModule,
}

impl FilterModule {
    pub fn new(source: SharedSource) -> Self {
        let envelope =
            EnvelopeModule::with_defaults(source.clone(), "filter", FILTER_ENVELOPE_DEFAULTS);
        Self { source, envelope }
    }

    pub fn config(&self) -> FilterConfig {
        FilterConfig::read(self.source.as_ref())
    }

    /// Build a filter for one voice, with the LFO bus (if any) summed into
    /// its cutoff
    pub fn create_filter(
        &self,
        graph: &mut SignalGraph,
        lfo_bus: Option<&ModulationBus>,
    ) -> Result<FilterInstance> {
        let config = self.config();

        let filter = graph.add(
            "voice_filter",
            BiquadFilter::new(config.filter_type, config.cutoff, config.resonance),
        );
        let env_source = graph.add("filter_env_source", ConstantSource::new(1.0));
        let env_gain = graph.add("filter_env_gain", Gain::new(config.env_amount));

        graph.connect(env_source.out("out"), env_gain.in_("in"))?;
        graph.connect(env_gain.out("out"), filter.param("frequency"))?;
        if let Some(bus) = lfo_bus {
            graph.connect(bus.output, filter.param("frequency"))?;
        }

        Ok(FilterInstance {
            filter: filter.id(),
            env_source: env_source.id(),
            env_gain: env_gain.id(),
        })
    }

    /// Start the envelope carrier and sweep the cutoff offset 0 → env amount
    pub fn apply_envelope(&self, graph: &mut SignalGraph, instance: &FilterInstance, start: f64) {
        let amount = self.config().env_amount;
        graph.start(instance.env_source, start);
        self.envelope
            .apply_envelope(graph, instance.env_depth(), start, 0.0, amount);
    }

    /// Release the cutoff offset back to zero; returns the release duration
    pub fn apply_release(&self, graph: &mut SignalGraph, instance: &FilterInstance, start: f64) -> f64 {
        self.envelope
            .apply_release(graph, instance.env_depth(), start, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use crate::modulation::combine_lfos;
    use crate::graph::PortRef;
    use crate::nodes::{Oscillator, OUT};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn test_config_defaults_and_overrides() {
        let source = MapParameterSource::new();
        assert_eq!(FilterConfig::read(&source), FilterConfig::default());

        source.set("filter.type", "highpass");
        source.set("filter.cutoff", 800.0);
        source.set("filter.release", 0.9);
        let config = FilterConfig::read(&source);
        assert_eq!(config.filter_type, FilterType::Highpass);
        assert_eq!(config.cutoff, 800.0);
        assert_eq!(config.envelope.release, 0.9);
        assert_eq!(config.envelope.attack, FILTER_ENVELOPE_DEFAULTS.attack);
    }

    #[test]
    fn test_create_filter_wiring() {
        let source = Arc::new(MapParameterSource::from_pairs([("filter.cutoff", 2000.0)]));
        let module = FilterModule::new(source);
        let mut graph = SignalGraph::new(44100.0);

        let instance = module.create_filter(&mut graph, None).unwrap();
        let biquad = graph.node::<BiquadFilter>(instance.filter).unwrap();
        assert_eq!(biquad.filter_type(), FilterType::Lowpass);
        assert_eq!(
            graph.param(instance.frequency()).unwrap().value(),
            2000.0
        );
        assert_eq!(
            graph.sources_of(instance.frequency()),
            vec![PortRef {
                node: instance.env_gain,
                port: OUT
            }]
        );
    }

    #[test]
    fn test_lfo_bus_shares_cutoff_target() {
        let module = FilterModule::new(Arc::new(MapParameterSource::new()));
        let mut graph = SignalGraph::new(44100.0);
        let lfo = graph.add("lfo", Oscillator::default());
        let bus = combine_lfos(&mut graph, &[lfo.out("out")]).unwrap().unwrap();

        let instance = module.create_filter(&mut graph, Some(&bus)).unwrap();
        let sources = graph.sources_of(instance.frequency());
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&lfo.out("out")));
    }

    #[test]
    fn test_envelope_and_release_on_depth() {
        let source = Arc::new(MapParameterSource::from_pairs([
            ("filter.envAmount", 1000.0),
            ("filter.attack", 0.1),
            ("filter.decay", 0.1),
            ("filter.sustain", 0.5),
            ("filter.release", 0.6),
        ]));
        let module = FilterModule::new(source);
        let mut graph = SignalGraph::new(44100.0);
        let instance = module.create_filter(&mut graph, None).unwrap();

        module.apply_envelope(&mut graph, &instance, 0.0);
        let depth = instance.env_depth();
        assert_abs_diff_eq!(graph.param_value_at(depth, 0.1).unwrap(), 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(graph.param_value_at(depth, 1.0).unwrap(), 500.0, epsilon = 1e-9);

        let release = module.apply_release(&mut graph, &instance, 1.0);
        assert_abs_diff_eq!(release, 0.6);
        assert_abs_diff_eq!(graph.param_value_at(depth, 1.6).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_instance_nodes_cover_whole_filter() {
        let module = FilterModule::new(Arc::new(MapParameterSource::new()));
        let mut graph = SignalGraph::new(44100.0);
        let before = graph.node_count();
        let instance = module.create_filter(&mut graph, None).unwrap();
        assert_eq!(graph.node_count(), before + 3);

        graph.remove_all(instance.nodes());
        assert_eq!(graph.node_count(), before);
        assert_eq!(graph.cable_count(), 0);
    }
}
