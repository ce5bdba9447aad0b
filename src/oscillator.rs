//! Oscillator Bank
//!
//! Builds the stacked tone generators of a voice from an ordered list of
//! oscillator configurations (`osc.count`, `osc.{i}.*`). Each oscillator feeds
//! its own level gain into the voice; a pitch bus, when present, drives every
//! oscillator's detune together.

use crate::config::{read_clamped, read_count, read_enum, ParamValue, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, SignalGraph, Target};
use crate::modulation::ModulationBus;
use crate::nodes::{Gain, Oscillator, Waveform};
use serde::{Deserialize, Serialize};

/// Upper bound on stacked oscillators per voice
pub const MAX_OSCILLATORS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OscillatorConfig {
    pub waveform: Waveform,
    /// Cents
    pub detune: f64,
    pub level: f64,
}

impl Default for OscillatorConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            detune: 0.0,
            level: 1.0,
        }
    }
}

impl OscillatorConfig {
    pub fn read(source: &dyn ParameterSource, index: usize) -> Self {
        let d = Self::default();
        let key = |field: &str| format!("osc.{}.{}", index, field);
        Self {
            waveform: read_enum(source, &key("waveform"), d.waveform),
            detune: read_clamped(source, &key("detune"), d.detune, -2400.0, 2400.0),
            level: read_clamped(source, &key("level"), d.level, 0.0, 1.0),
        }
    }

    pub fn to_params(&self, index: usize) -> Vec<(String, ParamValue)> {
        vec![
            (format!("osc.{}.waveform", index), self.waveform.as_str().into()),
            (format!("osc.{}.detune", index), self.detune.into()),
            (format!("osc.{}.level", index), self.level.into()),
        ]
    }
}

/// Oscillators of one voice and their level gains
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OscillatorSet {
    pub oscillators: Vec<NodeId>,
    pub levels: Vec<NodeId>,
}

impl OscillatorSet {
    pub fn len(&self) -> usize {
        self.oscillators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oscillators.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.oscillators.iter().chain(self.levels.iter()).copied()
    }
}

/// `osc.count` configurations, or one default sine when none are configured
pub fn oscillator_configs(source: &dyn ParameterSource) -> Vec<OscillatorConfig> {
    let count = read_count(source, "osc.count", 0).min(MAX_OSCILLATORS);
    if count == 0 {
        return vec![OscillatorConfig::default()];
    }
    (0..count).map(|i| OscillatorConfig::read(source, i)).collect()
}

pub struct OscillatorBank {
    source: SharedSource,
}

impl OscillatorBank {
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }

    /// Configured oscillators; never empty
    pub fn configs(&self) -> Vec<OscillatorConfig> {
        oscillator_configs(self.source.as_ref())
    }

    /// Build one oscillator per configuration, each through its level gain
    /// into `destination`
    pub fn create_oscillators(
        &self,
        graph: &mut SignalGraph,
        frequency: f64,
        destination: Target,
        pitch_bus: Option<&ModulationBus>,
    ) -> Result<OscillatorSet> {
        let mut set = OscillatorSet::default();

        for (i, config) in self.configs().iter().enumerate() {
            let osc = graph.add(format!("osc{}", i), Oscillator::new(config.waveform, frequency));
            graph.set_param(osc.param("detune"), config.detune);
            let level = graph.add(format!("osc{}_level", i), Gain::new(config.level));

            graph.connect(osc.out("out"), level.in_("in"))?;
            graph.connect(level.out("out"), destination)?;
            if let Some(bus) = pitch_bus {
                graph.connect(bus.output, osc.param("detune"))?;
            }

            set.oscillators.push(osc.id());
            set.levels.push(level.id());
        }

        Ok(set)
    }

    pub fn start_oscillators(&self, graph: &mut SignalGraph, set: &OscillatorSet, time: f64) {
        for &osc in &set.oscillators {
            graph.start(osc, time);
        }
    }

    /// Stop every oscillator at `time`, or immediately when `None`
    pub fn stop_oscillators(&self, graph: &mut SignalGraph, set: &OscillatorSet, time: Option<f64>) {
        for &osc in &set.oscillators {
            graph.stop(osc, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use crate::graph::ParamRef;
    use crate::nodes::ConstantSource;
    use std::sync::Arc;

    fn bank(pairs: Vec<(&str, ParamValue)>) -> OscillatorBank {
        OscillatorBank::new(Arc::new(MapParameterSource::from_pairs(pairs)))
    }

    #[test]
    fn test_empty_list_falls_back_to_sine() {
        let configs = bank(vec![]).configs();
        assert_eq!(configs, vec![OscillatorConfig::default()]);

        let configs = bank(vec![("osc.count", 0.0.into())]).configs();
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_configs_read_in_order() {
        let bank = bank(vec![
            ("osc.count", 2.0.into()),
            ("osc.0.waveform", "sine".into()),
            ("osc.1.waveform", "triangle".into()),
            ("osc.1.level", 0.5.into()),
            ("osc.1.detune", 7.0.into()),
        ]);
        let configs = bank.configs();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].waveform, Waveform::Triangle);
        assert_eq!(configs[1].level, 0.5);
        assert_eq!(configs[1].detune, 7.0);
    }

    #[test]
    fn test_create_oscillators_wiring() {
        let bank = bank(vec![
            ("osc.count", 2.0.into()),
            ("osc.1.waveform", "sawtooth".into()),
            ("osc.1.level", 0.25.into()),
        ]);
        let mut graph = SignalGraph::new(44100.0);
        let mix = graph.add("mix", Gain::new(1.0));
        let vibrato = graph.add("vibrato", ConstantSource::new(0.0));
        let bus = ModulationBus {
            output: vibrato.out("out"),
            mixer: None,
        };

        let set = bank
            .create_oscillators(&mut graph, 330.0, mix.in_("in").into(), Some(&bus))
            .unwrap();
        assert_eq!(set.len(), 2);

        let osc = graph.node::<Oscillator>(set.oscillators[1]).unwrap();
        assert_eq!(osc.waveform(), Waveform::Sawtooth);
        let level = graph
            .param(ParamRef {
                node: set.levels[1],
                param: Gain::GAIN,
            })
            .unwrap();
        assert_eq!(level.value(), 0.25);

        for &osc in &set.oscillators {
            let detune = ParamRef {
                node: osc,
                param: Oscillator::DETUNE,
            };
            assert!(graph.is_connected(vibrato.out("out"), detune));
        }
        assert_eq!(graph.sources_of(mix.in_("in")).len(), 2);
    }

    #[test]
    fn test_start_and_stop_apply_to_all() {
        let bank = bank(vec![("osc.count", 3.0.into())]);
        let mut graph = SignalGraph::new(100.0);
        let dest = graph.destination().in_("in");
        let set = bank
            .create_oscillators(&mut graph, 10.0, dest.into(), None)
            .unwrap();

        bank.start_oscillators(&mut graph, &set, 0.0);
        bank.stop_oscillators(&mut graph, &set, Some(0.05));
        graph.render(10);
        for &osc in &set.oscillators {
            assert!(graph.has_ended(osc));
        }
    }
}
