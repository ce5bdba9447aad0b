//! Feedback echo

use super::{gain_of, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, SignalGraph};
use crate::nodes::{Delay, Gain};
use serde::{Deserialize, Serialize};

/// Longest echo time
pub const MAX_DELAY_TIME: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Seconds
    pub time: f64,
    pub feedback: f64,
    pub mix: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            time: 0.3,
            feedback: 0.4,
            mix: 0.3,
        }
    }
}

impl DelayConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            time: read_clamped(source, "delay.time", d.time, 0.0, MAX_DELAY_TIME),
            feedback: read_clamped(source, "delay.feedback", d.feedback, 0.0, 0.95),
            mix: read_clamped(source, "delay.mix", d.mix, 0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DelayNodes {
    delay: NodeId,
    feedback: NodeId,
    dry: NodeId,
    wet: NodeId,
}

pub struct DelayEffect {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<DelayNodes>,
}

impl DelayEffect {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
        }
    }

    pub fn config(&self) -> DelayConfig {
        DelayConfig::read(self.source.as_ref())
    }

    pub fn delay_time(&self) -> Option<ParamRef> {
        self.nodes.map(|n| ParamRef {
            node: n.delay,
            param: Delay::DELAY_TIME,
        })
    }
}

impl Effect for DelayEffect {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "delay");

        let delay = self.group.add(graph, "delay_line", Delay::new(MAX_DELAY_TIME));
        let feedback = self
            .group
            .add(graph, "delay_feedback", Gain::new(config.feedback));
        let dry = self.group.add(graph, "delay_dry", Gain::new(1.0 - config.mix));
        let wet = self.group.add(graph, "delay_wet", Gain::new(config.mix));

        graph.set_param(delay.param("delay_time"), config.time);
        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(io.send(), delay.in_("in"))?;
        graph.connect(delay.out("out"), feedback.in_("in"))?;
        graph.connect(feedback.out("out"), delay.in_("in"))?;
        graph.connect(delay.out("out"), wet.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(wet.out("out"), io.ret())?;

        self.nodes = Some(DelayNodes {
            delay: delay.id(),
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
                node: nodes.delay,
                param: Delay::DELAY_TIME,
            },
            config.time,
        );
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
