//! Flanger: one short modulated delay with feedback

use super::{gain_of, start_now, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::nodes::{Delay, Gain, Oscillator, Waveform};
use serde::{Deserialize, Serialize};

/// Resting delay in seconds
pub const FLANGER_BASE_DELAY: f64 = 0.003;

/// Longest delay the line can reach
pub const FLANGER_MAX_DELAY: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlangerConfig {
    pub rate: f64,
    pub depth: f64,
    pub feedback: f64,
    pub mix: f64,
}

impl Default for FlangerConfig {
    fn default() -> Self {
        Self {
            rate: 0.25,
            depth: 0.7,
            feedback: 0.5,
            mix: 0.5,
        }
    }
}

impl FlangerConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            rate: read_clamped(source, "flanger.rate", d.rate, 0.01, 10.0),
            depth: read_clamped(source, "flanger.depth", d.depth, 0.0, 1.0),
            feedback: read_clamped(source, "flanger.feedback", d.feedback, 0.0, 0.95),
            mix: read_clamped(source, "flanger.mix", d.mix, 0.0, 1.0),
        }
    }

    /// LFO amplitude in seconds; the delay swings `centre ± sweep`
    pub fn sweep(&self) -> f64 {
        self.depth * (FLANGER_MAX_DELAY - FLANGER_BASE_DELAY) * 0.5
    }

    /// Midpoint of the swept range, so the delay spans
    /// `[base, base + depth · (max - base)]`
    pub fn centre(&self) -> f64 {
        FLANGER_BASE_DELAY + self.sweep()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FlangerNodes {
    delay: NodeId,
    lfo: NodeId,
    sweep: NodeId,
    feedback: NodeId,
    dry: NodeId,
    wet: NodeId,
}

pub struct Flanger {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<FlangerNodes>,
}

impl Flanger {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
        }
    }

    pub fn config(&self) -> FlangerConfig {
        FlangerConfig::read(self.source.as_ref())
    }

    pub fn delay_line(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.delay)
    }
}

impl Effect for Flanger {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "flanger");

        let dry = self.group.add(graph, "flanger_dry", Gain::new(1.0 - config.mix));
        let wet = self.group.add(graph, "flanger_wet", Gain::new(config.mix));
        let delay = self
            .group
            .add(graph, "flanger_delay", Delay::new(FLANGER_MAX_DELAY));
        let feedback = self
            .group
            .add(graph, "flanger_feedback", Gain::new(config.feedback));
        let lfo = self
            .group
            .add(graph, "flanger_lfo", Oscillator::new(Waveform::Sine, config.rate));
        let sweep = self.group.add(graph, "flanger_sweep", Gain::new(config.sweep()));

        graph.set_param(delay.param("delay_time"), config.centre());
        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(io.send(), delay.in_("in"))?;
        graph.connect(delay.out("out"), wet.in_("in"))?;
        graph.connect(wet.out("out"), io.ret())?;
        graph.connect(delay.out("out"), feedback.in_("in"))?;
        graph.connect(feedback.out("out"), delay.in_("in"))?;
        graph.connect(lfo.out("out"), sweep.in_("in"))?;
        graph.connect(sweep.out("out"), delay.param("delay_time"))?;
        start_now(graph, lfo.id());

        self.nodes = Some(FlangerNodes {
            delay: delay.id(),
            lfo: lfo.id(),
            sweep: sweep.id(),
            feedback: feedback.id(),
            dry: dry.id(),
            wet: wet.id(),
        });
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        let nodes = match self.nodes {
            Some(n) => n,
            None => return Ok(()),
        };
        let config = self.config();
        graph.set_value_now(
            ParamRef {
                node: nodes.lfo,
                param: Oscillator::FREQUENCY,
            },
            config.rate,
        );
        graph.set_value_now(
            ParamRef {
                node: nodes.delay,
                param: Delay::DELAY_TIME,
            },
            config.centre(),
        );
        graph.set_value_now(gain_of(nodes.sweep), config.sweep());
        graph.set_value_now(gain_of(nodes.feedback), config.feedback);
        graph.set_value_now(gain_of(nodes.dry), 1.0 - config.mix);
        graph.set_value_now(gain_of(nodes.wet), config.mix);
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
