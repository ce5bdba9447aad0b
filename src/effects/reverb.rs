//! Convolution reverb against a synthetic impulse
//!
//! The impulse depends on `reverb.decay` but is only rebuilt through
//! [`Reverb::regenerate_impulse`]; [`Effect::update`] changes the mix alone.

use super::{gain_of, Effect, EffectNodes, NodeGroup};
use crate::buffer::AudioBuffer;
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, SignalGraph};
use crate::nodes::{Convolver, Gain};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stereo impulse of `round(sample_rate · decay)` samples:
/// uniform noise under a `(1 - i/len)^decay` envelope
pub fn generate_impulse<R: Rng>(sample_rate: f64, decay: f64, rng: &mut R) -> AudioBuffer {
    let len = ((sample_rate * decay).round() as usize).max(1);
    let channels = (0..2)
        .map(|_| {
            (0..len)
                .map(|i| {
                    let envelope = (1.0 - i as f64 / len as f64).powf(decay);
                    (rng.gen_range(-1.0..=1.0) * envelope) as f32
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_channels(channels, sample_rate)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbConfig {
    /// Impulse length in seconds and envelope exponent
    pub decay: f64,
    pub reverb_mix: f64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            decay: 2.0,
            reverb_mix: 0.3,
        }
    }
}

impl ReverbConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            decay: read_clamped(source, "reverb.decay", d.decay, 0.1, 10.0),
            reverb_mix: read_clamped(source, "reverb.reverbMix", d.reverb_mix, 0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ReverbNodes {
    convolver: NodeId,
    dry: NodeId,
    wet: NodeId,
}

pub struct Reverb {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<ReverbNodes>,
    impulse: Option<Arc<AudioBuffer>>,
    rng: StdRng,
}

impl Reverb {
    pub fn new(source: SharedSource) -> Self {
        Self::with_rng(source, StdRng::from_entropy())
    }

    /// Deterministic impulses for reproducible renders
    pub fn with_seed(source: SharedSource, seed: u64) -> Self {
        Self::with_rng(source, StdRng::seed_from_u64(seed))
    }

    fn with_rng(source: SharedSource, rng: StdRng) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
            impulse: None,
            rng,
        }
    }

    pub fn config(&self) -> ReverbConfig {
        ReverbConfig::read(self.source.as_ref())
    }

    /// Impulse currently loaded into the convolver
    pub fn impulse(&self) -> Option<&Arc<AudioBuffer>> {
        self.impulse.as_ref()
    }

    pub fn convolver(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.convolver)
    }

    /// Rebuild the impulse from the current decay and load it
    pub fn regenerate_impulse(&mut self, graph: &mut SignalGraph) {
        let decay = self.config().decay;
        let impulse = Arc::new(generate_impulse(graph.sample_rate(), decay, &mut self.rng));
        if let Some(convolver) = self
            .nodes
            .and_then(|n| graph.node_mut::<Convolver>(n.convolver))
        {
            convolver.set_buffer(impulse.clone());
        }
        self.impulse = Some(impulse);
    }
}

impl Effect for Reverb {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "reverb");

        let convolver = self.group.add(graph, "reverb_convolver", Convolver::new());
        let dry = self
            .group
            .add(graph, "reverb_dry", Gain::new(1.0 - config.reverb_mix));
        let wet = self
            .group
            .add(graph, "reverb_wet", Gain::new(config.reverb_mix));

        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(io.send(), convolver.in_("in"))?;
        graph.connect(convolver.out("out"), wet.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(wet.out("out"), io.ret())?;

        self.nodes = Some(ReverbNodes {
            convolver: convolver.id(),
            dry: dry.id(),
            wet: wet.id(),
        });
        self.regenerate_impulse(graph);
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        if let Some(nodes) = self.nodes {
            let mix = self.config().reverb_mix;
            graph.set_value_now(gain_of(nodes.dry), 1.0 - mix);
            graph.set_value_now(gain_of(nodes.wet), mix);
        }
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.nodes = None;
        self.impulse = None;
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;

    #[test]
    fn test_impulse_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let impulse = generate_impulse(44100.0, 2.5, &mut rng);
        assert_eq!(impulse.number_of_channels(), 2);
        assert_eq!(impulse.length(), 110_250);

        for ch in 0..2 {
            let data = impulse.channel(ch);
            assert!(data.iter().all(|s| (-1.0..=1.0).contains(s)));
            let head: f32 = data[..1000].iter().map(|s| s.abs()).sum();
            let tail: f32 = data[data.len() - 1000..].iter().map(|s| s.abs()).sum();
            assert!(tail < head * 0.01);
        }
        assert_ne!(impulse.channel(0), impulse.channel(1));
    }

    #[test]
    fn test_decay_change_needs_regenerate() {
        let source = Arc::new(MapParameterSource::from_pairs([("reverb.decay", 0.5)]));
        let mut graph = SignalGraph::new(8000.0);
        let mut reverb = Reverb::with_seed(source.clone(), 1);
        reverb.initialize(&mut graph).unwrap();
        let first = reverb.impulse().cloned().unwrap();
        assert_eq!(first.length(), 4000);

        source.set("reverb.decay", 1.0);
        reverb.update(&mut graph).unwrap();
        assert!(Arc::ptr_eq(&first, reverb.impulse().unwrap()));

        reverb.regenerate_impulse(&mut graph);
        let second = reverb.impulse().cloned().unwrap();
        assert_eq!(second.length(), 8000);
        let loaded = graph
            .node::<Convolver>(reverb.convolver().unwrap())
            .and_then(|c| c.buffer().cloned())
            .unwrap();
        assert!(Arc::ptr_eq(&loaded, &second));
    }

    #[test]
    fn test_mix_update() {
        let source = Arc::new(MapParameterSource::new());
        let mut graph = SignalGraph::new(8000.0);
        let mut reverb = Reverb::with_seed(source.clone(), 2);
        reverb.initialize(&mut graph).unwrap();

        source.set("reverb.reverbMix", 0.8);
        reverb.update(&mut graph).unwrap();
        let wet = gain_of(reverb.nodes.unwrap().wet);
        let value = graph.param_value_at(wet, 0.0).unwrap();
        assert!((value - 0.8).abs() < 1e-12);
    }
}
