//! Tremolo: an LFO summed into a gain so the amplitude swings between
//! `1 - depth` and `1`

use super::{gain_of, start_now, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::nodes::{Gain, Oscillator, Waveform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloConfig {
    pub rate: f64,
    pub depth: f64,
}

impl Default for TremoloConfig {
    fn default() -> Self {
        Self {
            rate: 5.0,
            depth: 0.5,
        }
    }
}

impl TremoloConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            rate: read_clamped(source, "tremolo.rate", d.rate, 0.01, 20.0),
            depth: read_clamped(source, "tremolo.depth", d.depth, 0.0, 1.0),
        }
    }

    /// Resting gain the LFO swings around
    pub fn base_gain(&self) -> f64 {
        1.0 - self.depth / 2.0
    }

    pub fn lfo_depth(&self) -> f64 {
        self.depth / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TremoloNodes {
    amp: NodeId,
    lfo: NodeId,
    depth: NodeId,
}

pub struct Tremolo {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<TremoloNodes>,
}

impl Tremolo {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
        }
    }

    pub fn config(&self) -> TremoloConfig {
        TremoloConfig::read(self.source.as_ref())
    }

    /// Gain parameter the LFO modulates
    pub fn amplitude(&self) -> Option<ParamRef> {
        self.nodes.map(|n| gain_of(n.amp))
    }
}

impl Effect for Tremolo {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "tremolo");

        let amp = self.group.add(graph, "tremolo_amp", Gain::new(config.base_gain()));
        let lfo = self
            .group
            .add(graph, "tremolo_lfo", Oscillator::new(Waveform::Sine, config.rate));
        let depth = self
            .group
            .add(graph, "tremolo_depth", Gain::new(config.lfo_depth()));

        graph.connect(io.send(), amp.in_("in"))?;
        graph.connect(amp.out("out"), io.ret())?;
        graph.connect(lfo.out("out"), depth.in_("in"))?;
        graph.connect(depth.out("out"), amp.param("gain"))?;
        start_now(graph, lfo.id());

        self.nodes = Some(TremoloNodes {
            amp: amp.id(),
            lfo: lfo.id(),
            depth: depth.id(),
        });
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        let nodes = match self.nodes {
            Some(n) => n,
            None => return Ok(()),
        };
        let config = self.config();
        graph.set_value_now(gain_of(nodes.amp), config.base_gain());
        graph.set_value_now(gain_of(nodes.depth), config.lfo_depth());
        graph.set_value_now(
            ParamRef {
                node: nodes.lfo,
                param: Oscillator::FREQUENCY,
            },
            config.rate,
        );
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.nodes = None;
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use crate::nodes::ConstantSource;
    use std::sync::Arc;

    #[test]
    fn test_amplitude_bounded() {
        let source = Arc::new(MapParameterSource::from_pairs([
            ("tremolo.rate", 10.0),
            ("tremolo.depth", 0.6),
        ]));
        let mut graph = SignalGraph::new(1000.0);
        let mut tremolo = Tremolo::new(source);
        let io = tremolo.initialize(&mut graph).unwrap();
        let dc = graph.add("dc", ConstantSource::new(1.0));
        graph.connect(dc.out("out"), io.input_port()).unwrap();
        let dest = graph.destination().in_("in");
        graph.connect(io.output_port(), dest).unwrap();
        graph.start(dc.id(), 0.0);

        let out = graph.render(1000);
        let min = out.iter().map(|f| f.left).fold(f64::MAX, f64::min);
        let max = out.iter().map(|f| f.left).fold(f64::MIN, f64::max);
        assert!(min >= 0.4 - 1e-9);
        assert!(max <= 1.0 + 1e-9);
        assert!(min < 0.45 && max > 0.95);
    }

    #[test]
    fn test_zero_depth_is_transparent() {
        let config = TremoloConfig {
            rate: 5.0,
            depth: 0.0,
        };
        assert_eq!(config.base_gain(), 1.0);
        assert_eq!(config.lfo_depth(), 0.0);
    }
}
