//! Phaser: serial allpass stages swept by one shared LFO, with feedback from
//! the last stage into the first

use super::{gain_of, start_now, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, read_count, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, PortRef, SignalGraph};
use crate::nodes::{BiquadFilter, Delay, FilterType, Gain, Oscillator, Waveform, IN};
use serde::{Deserialize, Serialize};

/// Resting center frequency of every stage
const PHASER_BASE_FREQUENCY: f64 = 1000.0;

/// Sweep in Hz at full depth
const PHASER_SWEEP: f64 = 800.0;

const PHASER_Q: f64 = 1.0;

const MAX_STAGES: usize = 12;

/// Feedback is capped below unity so the loop stays stable
const MAX_FEEDBACK: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaserConfig {
    pub rate: f64,
    pub depth: f64,
    pub stages: usize,
    pub feedback: f64,
    pub mix: f64,
}

impl Default for PhaserConfig {
    fn default() -> Self {
        Self {
            rate: 0.5,
            depth: 0.7,
            stages: 4,
            feedback: 0.3,
            mix: 0.5,
        }
    }
}

impl PhaserConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            rate: read_clamped(source, "phaser.rate", d.rate, 0.01, 10.0),
            depth: read_clamped(source, "phaser.depth", d.depth, 0.0, 1.0),
            stages: read_count(source, "phaser.stages", d.stages).clamp(1, MAX_STAGES),
            feedback: read_clamped(source, "phaser.feedback", d.feedback, 0.0, MAX_FEEDBACK),
            mix: read_clamped(source, "phaser.mix", d.mix, 0.0, 1.0),
        }
    }

    /// Center-frequency sweep in Hz
    pub fn sweep(&self) -> f64 {
        self.depth * PHASER_SWEEP
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PhaserNodes {
    stages: Vec<NodeId>,
    lfo: NodeId,
    sweep: NodeId,
    feedback: NodeId,
    dry: NodeId,
    wet: NodeId,
}

pub struct Phaser {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<PhaserNodes>,
}

impl Phaser {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
        }
    }

    pub fn config(&self) -> PhaserConfig {
        PhaserConfig::read(self.source.as_ref())
    }

    /// Number of allpass stages currently wired
    pub fn stage_count(&self) -> usize {
        self.nodes.as_ref().map_or(0, |n| n.stages.len())
    }

    pub fn stages(&self) -> &[NodeId] {
        self.nodes
            .as_ref()
            .map(|n| n.stages.as_slice())
            .unwrap_or_default()
    }

    pub fn lfo(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.lfo)
    }

    pub fn feedback_gain(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.feedback)
    }
}

impl Effect for Phaser {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "phaser");
        self.nodes = None;

        let dry = self.group.add(graph, "phaser_dry", Gain::new(1.0 - config.mix));
        let wet = self.group.add(graph, "phaser_wet", Gain::new(config.mix));
        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(wet.out("out"), io.ret())?;

        let lfo = self
            .group
            .add(graph, "phaser_lfo", Oscillator::new(Waveform::Sine, config.rate));
        let sweep = self.group.add(graph, "phaser_sweep", Gain::new(config.sweep()));
        graph.connect(lfo.out("out"), sweep.in_("in"))?;

        let mut stages = Vec::with_capacity(config.stages);
        let mut previous = io.send();
        for i in 0..config.stages {
            let stage = self.group.add(
                graph,
                format!("phaser_stage{}", i),
                BiquadFilter::new(FilterType::Allpass, PHASER_BASE_FREQUENCY, PHASER_Q),
            );
            graph.connect(previous, stage.in_("in"))?;
            graph.connect(sweep.out("out"), stage.param("frequency"))?;
            previous = stage.out("out");
            stages.push(stage.id());
        }
        graph.connect(previous, wet.in_("in"))?;

        // last stage → feedback gain → one-sample delay → first stage
        let feedback = self
            .group
            .add(graph, "phaser_feedback", Gain::new(config.feedback));
        let loop_delay = self.group.add(graph, "phaser_loop", Delay::new(0.01));
        graph.connect(previous, feedback.in_("in"))?;
        graph.connect(feedback.out("out"), loop_delay.in_("in"))?;
        if let Some(&first) = stages.first() {
            graph.connect(loop_delay.out("out"), PortRef { node: first, port: IN })?;
        }

        start_now(graph, lfo.id());
        self.nodes = Some(PhaserNodes {
            stages,
            lfo: lfo.id(),
            sweep: sweep.id(),
            feedback: feedback.id(),
            dry: dry.id(),
            wet: wet.id(),
        });
        Ok(io)
    }

    /// Applies new values; a stage-count change rebuilds the effect body
    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        let config = self.config();
        let nodes = match &self.nodes {
            Some(n) => n.clone(),
            None => return Ok(()),
        };
        if nodes.stages.len() != config.stages {
            self.initialize(graph)?;
            return Ok(());
        }

        graph.set_value_now(
            ParamRef {
                node: nodes.lfo,
                param: Oscillator::FREQUENCY,
            },
            config.rate,
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
