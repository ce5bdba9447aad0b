//! Low-Frequency Oscillators
//!
//! One periodic source per [`LfoModule`], routed through two independent
//! depth gains: filter modulation (Hz added to cutoff) and pitch modulation
//! (cents added to detune). Instances are combined only where a voice wires
//! them, never here.

use crate::config::{read_clamped, read_count, read_enum, ParamValue, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, PortRef, SignalGraph};
use crate::nodes::{Gain, Oscillator, Waveform, OUT};
use serde::{Deserialize, Serialize};

/// Upper bound on concurrently configured LFOs
pub const MAX_LFOS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LfoConfig {
    pub waveform: Waveform,
    /// Hz
    pub rate: f64,
    /// Cutoff depth in Hz
    pub to_filter: f64,
    /// Pitch depth in cents
    pub to_pitch: f64,
}

impl Default for LfoConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            rate: 5.0,
            to_filter: 0.0,
            to_pitch: 0.0,
        }
    }
}

impl LfoConfig {
    pub fn read(source: &dyn ParameterSource, index: usize) -> Self {
        let d = Self::default();
        let key = |field: &str| format!("lfo.{}.{}", index, field);
        Self {
            waveform: read_enum(source, &key("waveform"), d.waveform),
            rate: read_clamped(source, &key("rate"), d.rate, 0.0, 100.0),
            to_filter: read_clamped(source, &key("toFilter"), d.to_filter, 0.0, 10_000.0),
            to_pitch: read_clamped(source, &key("toPitch"), d.to_pitch, 0.0, 1200.0),
        }
    }

    pub fn to_params(&self, index: usize) -> Vec<(String, ParamValue)> {
        vec![
            (format!("lfo.{}.waveform", index), self.waveform.as_str().into()),
            (format!("lfo.{}.rate", index), self.rate.into()),
            (format!("lfo.{}.toFilter", index), self.to_filter.into()),
            (format!("lfo.{}.toPitch", index), self.to_pitch.into()),
        ]
    }
}

/// Number of configured LFOs (`lfo.count`, default one)
pub fn lfo_count(source: &dyn ParameterSource) -> usize {
    read_count(source, "lfo.count", 1).min(MAX_LFOS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LfoNodes {
    oscillator: NodeId,
    filter_depth: NodeId,
    pitch_depth: NodeId,
}

pub struct LfoModule {
    source: SharedSource,
    index: usize,
    nodes: Option<LfoNodes>,
}

impl LfoModule {
    pub fn new(source: SharedSource, index: usize) -> Self {
        Self {
            source,
            index,
            nodes: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> LfoConfig {
        LfoConfig::read(self.source.as_ref(), self.index)
    }

    pub fn is_built(&self) -> bool {
        self.nodes.is_some()
    }

    /// Create and start the oscillator and its two depth gains.
    ///
    /// Building again tears the previous nodes down first.
    pub fn build(&mut self, graph: &mut SignalGraph) -> Result<()> {
        self.teardown(graph);
        let config = self.config();

        let osc = graph.add(
            format!("lfo{}", self.index),
            Oscillator::new(config.waveform, config.rate),
        );
        let filter_depth = graph.add(
            format!("lfo{}_filter_depth", self.index),
            Gain::new(config.to_filter),
        );
        let pitch_depth = graph.add(
            format!("lfo{}_pitch_depth", self.index),
            Gain::new(config.to_pitch),
        );

        graph.connect(osc.out("out"), filter_depth.in_("in"))?;
        graph.connect(osc.out("out"), pitch_depth.in_("in"))?;
        let now = graph.current_time();
        graph.start(osc.id(), now);

        self.nodes = Some(LfoNodes {
            oscillator: osc.id(),
            filter_depth: filter_depth.id(),
            pitch_depth: pitch_depth.id(),
        });
        Ok(())
    }

    pub fn oscillator(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.oscillator)
    }

    /// Bus carrying cutoff modulation in Hz
    pub fn filter_output(&self) -> Option<PortRef> {
        self.nodes.map(|n| PortRef {
            node: n.filter_depth,
            port: OUT,
        })
    }

    /// Bus carrying pitch modulation in cents
    pub fn pitch_output(&self) -> Option<PortRef> {
        self.nodes.map(|n| PortRef {
            node: n.pitch_depth,
            port: OUT,
        })
    }

    /// Re-read rate, depths and waveform and apply them at the current time
    pub fn update(&self, graph: &mut SignalGraph) {
        let nodes = match self.nodes {
            Some(n) => n,
            None => return,
        };
        let config = self.config();
        let gain = |node| ParamRef {
            node,
            param: Gain::GAIN,
        };

        graph.set_value_now(
            ParamRef {
                node: nodes.oscillator,
                param: Oscillator::FREQUENCY,
            },
            config.rate,
        );
        graph.set_value_now(gain(nodes.filter_depth), config.to_filter);
        graph.set_value_now(gain(nodes.pitch_depth), config.to_pitch);
        if let Some(osc) = graph.node_mut::<Oscillator>(nodes.oscillator) {
            osc.set_waveform(config.waveform);
        }
    }

    /// Whether any voice is still wired to one of the depth busses
    pub fn is_referenced(&self, graph: &SignalGraph) -> bool {
        self.nodes.map_or(false, |n| {
            !graph.targets_of(n.filter_depth).is_empty()
                || !graph.targets_of(n.pitch_depth).is_empty()
        })
    }

    /// Remove the LFO's nodes and every cable touching them
    pub fn teardown(&mut self, graph: &mut SignalGraph) {
        if let Some(nodes) = self.nodes.take() {
            graph.remove_all([nodes.oscillator, nodes.filter_depth, nodes.pitch_depth]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use std::sync::Arc;

    #[test]
    fn test_outputs_absent_until_built() {
        let lfo = LfoModule::new(Arc::new(MapParameterSource::new()), 0);
        assert!(lfo.filter_output().is_none());
        assert!(lfo.pitch_output().is_none());
        assert_eq!(lfo.config(), LfoConfig::default());
    }

    #[test]
    fn test_build_creates_scaled_busses() {
        let source = Arc::new(MapParameterSource::from_pairs([
            ("lfo.0.rate", 3.0),
            ("lfo.0.toFilter", 400.0),
            ("lfo.0.toPitch", 25.0),
        ]));
        let mut graph = SignalGraph::new(44100.0);
        let mut lfo = LfoModule::new(source, 0);
        lfo.build(&mut graph).unwrap();

        let filter = lfo.filter_output().unwrap();
        let pitch = lfo.pitch_output().unwrap();
        assert_ne!(filter.node, pitch.node);
        let gain_of = |node| {
            graph
                .param(ParamRef {
                    node,
                    param: Gain::GAIN,
                })
                .unwrap()
                .value()
        };
        assert_eq!(gain_of(filter.node), 400.0);
        assert_eq!(gain_of(pitch.node), 25.0);
        assert_eq!(graph.cable_count(), 2);
    }

    #[test]
    fn test_update_schedules_new_depths() {
        let source = Arc::new(MapParameterSource::new());
        let mut graph = SignalGraph::new(44100.0);
        let mut lfo = LfoModule::new(source.clone(), 1);
        lfo.build(&mut graph).unwrap();

        source.set("lfo.1.toFilter", 900.0);
        source.set("lfo.1.waveform", "square");
        lfo.update(&mut graph);

        let depth = ParamRef {
            node: lfo.filter_output().unwrap().node,
            param: Gain::GAIN,
        };
        assert_eq!(graph.param_value_at(depth, 0.0), Some(900.0));
        let osc = graph.node::<Oscillator>(lfo.oscillator().unwrap()).unwrap();
        assert_eq!(osc.waveform(), Waveform::Square);
    }

    #[test]
    fn test_teardown_and_rebuild_leaves_no_leftovers() {
        let mut graph = SignalGraph::new(44100.0);
        let mut lfo = LfoModule::new(Arc::new(MapParameterSource::new()), 0);
        lfo.build(&mut graph).unwrap();
        lfo.build(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.cable_count(), 2);

        lfo.teardown(&mut graph);
        assert_eq!(graph.node_count(), 1);
        assert!(!lfo.is_built());
    }

    #[test]
    fn test_referenced_while_a_bus_is_wired() {
        let mut graph = SignalGraph::new(44100.0);
        let mut lfo = LfoModule::new(Arc::new(MapParameterSource::new()), 0);
        assert!(!lfo.is_referenced(&graph));
        lfo.build(&mut graph).unwrap();
        assert!(!lfo.is_referenced(&graph));

        let cutoff = graph.add("cutoff", Gain::new(1.0));
        graph
            .connect(lfo.pitch_output().unwrap(), cutoff.param("gain"))
            .unwrap();
        assert!(lfo.is_referenced(&graph));

        graph.remove(cutoff.id()).unwrap();
        assert!(!lfo.is_referenced(&graph));
    }

    #[test]
    fn test_lfo_count_default() {
        let source = MapParameterSource::new();
        assert_eq!(lfo_count(&source), 1);
        source.set("lfo.count", 9.0);
        assert_eq!(lfo_count(&source), MAX_LFOS);
    }
}
