//! Compressor: configuration passthrough to a [`DynamicsCompressor`] node

use super::{Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::nodes::DynamicsCompressor;
use crate::port::ParamId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// dB
    pub threshold: f64,
    pub ratio: f64,
    /// Seconds
    pub attack: f64,
    /// Seconds
    pub release: f64,
    /// dB
    pub knee: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold: -24.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
            knee: 30.0,
        }
    }
}

impl CompressorConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            threshold: read_clamped(source, "compressor.threshold", d.threshold, -100.0, 0.0),
            ratio: read_clamped(source, "compressor.ratio", d.ratio, 1.0, 20.0),
            attack: read_clamped(source, "compressor.attack", d.attack, 0.0, 1.0),
            release: read_clamped(source, "compressor.release", d.release, 0.0, 1.0),
            knee: read_clamped(source, "compressor.knee", d.knee, 0.0, 40.0),
        }
    }

    fn params(&self) -> [(ParamId, f64); 5] {
        [
            (DynamicsCompressor::THRESHOLD, self.threshold),
            (DynamicsCompressor::RATIO, self.ratio),
            (DynamicsCompressor::ATTACK, self.attack),
            (DynamicsCompressor::RELEASE, self.release),
            (DynamicsCompressor::KNEE, self.knee),
        ]
    }
}

pub struct Compressor {
    source: SharedSource,
    group: NodeGroup,
    node: Option<NodeId>,
}

impl Compressor {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            node: None,
        }
    }

    pub fn config(&self) -> CompressorConfig {
        CompressorConfig::read(self.source.as_ref())
    }

    pub fn compressor(&self) -> Option<NodeId> {
        self.node
    }

    /// Current gain reduction in dB, zero when not initialized
    pub fn reduction(&self, graph: &SignalGraph) -> f64 {
        self.node
            .and_then(|n| graph.node::<DynamicsCompressor>(n))
            .map_or(0.0, |c| c.reduction())
    }
}

impl Effect for Compressor {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let io = self.group.reset(graph, "compressor");
        let node = self
            .group
            .add(graph, "compressor", DynamicsCompressor::new());

        for (param, value) in self.config().params() {
            graph.set_param(
                ParamRef {
                    node: node.id(),
                    param,
                },
                value,
            );
        }
        graph.connect(io.send(), node.in_("in"))?;
        graph.connect(node.out("out"), io.ret())?;

        self.node = Some(node.id());
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        if let Some(node) = self.node {
            for (param, value) in self.config().params() {
                graph.set_value_now(ParamRef { node, param }, value);
            }
        }
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.node = None;
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
    fn test_config_passed_through() {
        let source = Arc::new(MapParameterSource::from_pairs([
            ("compressor.threshold", -12.0),
            ("compressor.ratio", 8.0),
        ]));
        let mut graph = SignalGraph::new(44100.0);
        let mut compressor = Compressor::new(source);
        compressor.initialize(&mut graph).unwrap();
        let node = compressor.compressor().unwrap();

        let value = |param| graph.param(ParamRef { node, param }).unwrap().value();
        assert_eq!(value(DynamicsCompressor::THRESHOLD), -12.0);
        assert_eq!(value(DynamicsCompressor::RATIO), 8.0);
        assert_eq!(value(DynamicsCompressor::KNEE), 30.0);
        assert_eq!(value(DynamicsCompressor::ATTACK), 0.003);
    }

    #[test]
    fn test_loud_input_is_reduced() {
        let source = Arc::new(MapParameterSource::from_pairs([
            ("compressor.threshold", -20.0),
            ("compressor.knee", 0.0),
        ]));
        let mut graph = SignalGraph::new(8000.0);
        let mut compressor = Compressor::new(source);
        let io = compressor.initialize(&mut graph).unwrap();
        assert_eq!(compressor.reduction(&graph), 0.0);

        let dc = graph.add("dc", ConstantSource::new(1.0));
        graph.connect(dc.out("out"), io.input_port()).unwrap();
        let dest = graph.destination().in_("in");
        graph.connect(io.output_port(), dest).unwrap();
        graph.start(dc.id(), 0.0);

        let out = graph.render(8000);
        assert!(compressor.reduction(&graph) < -10.0);
        assert!(out[7999].left < 0.5);
    }
}
