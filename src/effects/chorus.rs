//! Chorus: three short delay lines, each swept by its own LFO

use super::{gain_of, start_now, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::nodes::{Delay, Gain, Oscillator, Waveform};
use serde::{Deserialize, Serialize};

/// Resting delay of each chorus line in seconds
pub const CHORUS_BASE_DELAYS: [f64; 3] = [0.012, 0.018, 0.024];

const CHORUS_MAX_DELAY: f64 = 0.05;

/// LFO rate spread between consecutive lines
const RATE_SPREAD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusConfig {
    /// Hz
    pub rate: f64,
    /// Sweep depth in milliseconds
    pub depth: f64,
    pub mix: f64,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            rate: 1.5,
            depth: 5.0,
            mix: 0.3,
        }
    }
}

impl ChorusConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            rate: read_clamped(source, "chorus.rate", d.rate, 0.01, 20.0),
            depth: read_clamped(source, "chorus.depth", d.depth, 0.0, 10.0),
            mix: read_clamped(source, "chorus.mix", d.mix, 0.0, 1.0),
        }
    }

    /// LFO rate of line `index`
    pub fn line_rate(&self, index: usize) -> f64 {
        self.rate * (1.0 + index as f64 * RATE_SPREAD)
    }

    /// Delay modulation depth in seconds
    pub fn depth_seconds(&self) -> f64 {
        self.depth / 1000.0
    }
}

/// One modulated line of the chorus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusVoice {
    pub delay: NodeId,
    pub lfo: NodeId,
    pub mod_gain: NodeId,
}

impl ChorusVoice {
    pub fn lfo_frequency(&self) -> ParamRef {
        ParamRef {
            node: self.lfo,
            param: Oscillator::FREQUENCY,
        }
    }

    pub fn delay_time(&self) -> ParamRef {
        ParamRef {
            node: self.delay,
            param: Delay::DELAY_TIME,
        }
    }
}

pub struct Chorus {
    source: SharedSource,
    group: NodeGroup,
    dry: Option<NodeId>,
    wet: Option<NodeId>,
    voices: Vec<ChorusVoice>,
}

impl Chorus {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            dry: None,
            wet: None,
            voices: Vec::new(),
        }
    }

    pub fn config(&self) -> ChorusConfig {
        ChorusConfig::read(self.source.as_ref())
    }

    pub fn voices(&self) -> &[ChorusVoice] {
        &self.voices
    }

    pub fn mix_gains(&self) -> Option<(NodeId, NodeId)> {
        self.dry.zip(self.wet)
    }
}

impl Effect for Chorus {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "chorus");
        self.voices.clear();

        let dry = self.group.add(graph, "chorus_dry", Gain::new(1.0 - config.mix));
        let wet = self.group.add(graph, "chorus_wet", Gain::new(config.mix));
        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(wet.out("out"), io.ret())?;

        for (i, base) in CHORUS_BASE_DELAYS.iter().enumerate() {
            let delay = self
                .group
                .add(graph, format!("chorus_delay{}", i), Delay::new(CHORUS_MAX_DELAY));
            let lfo = self.group.add(
                graph,
                format!("chorus_lfo{}", i),
                Oscillator::new(Waveform::Sine, config.line_rate(i)),
            );
            let mod_gain = self.group.add(
                graph,
                format!("chorus_depth{}", i),
                Gain::new(config.depth_seconds()),
            );

            graph.set_param(delay.param("delay_time"), *base);
            graph.connect(lfo.out("out"), mod_gain.in_("in"))?;
            graph.connect(mod_gain.out("out"), delay.param("delay_time"))?;
            graph.connect(io.send(), delay.in_("in"))?;
            graph.connect(delay.out("out"), wet.in_("in"))?;
            start_now(graph, lfo.id());

            self.voices.push(ChorusVoice {
                delay: delay.id(),
                lfo: lfo.id(),
                mod_gain: mod_gain.id(),
            });
        }

        self.dry = Some(dry.id());
        self.wet = Some(wet.id());
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        let config = self.config();
        if let Some((dry, wet)) = self.mix_gains() {
            graph.set_value_now(gain_of(dry), 1.0 - config.mix);
            graph.set_value_now(gain_of(wet), config.mix);
        }
        for (i, voice) in self.voices.iter().enumerate() {
            graph.set_value_now(voice.lfo_frequency(), config.line_rate(i));
            graph.set_value_now(gain_of(voice.mod_gain), config.depth_seconds());
        }
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.voices.clear();
        self.dry = None;
        self.wet = None;
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}
