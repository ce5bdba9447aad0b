//! Layer 1: Signal Conventions and Port System
//!
//! This module defines the sample type carried on audio ports, port and
//! parameter definitions, and the type-erased [`AudioNode`] interface that
//! every processing node in the [`SignalGraph`](crate::graph::SignalGraph)
//! implements.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul};

/// Unique identifier for a port within a node
pub type PortId = u32;

/// Unique identifier for an automatable parameter within a node
pub type ParamId = u32;

/// One stereo sample frame.
///
/// Mono sources write the same value to both channels; parameter inputs
/// receive the downmixed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub left: f64,
    pub right: f64,
}

impl Frame {
    pub const SILENCE: Frame = Frame {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// A frame carrying the same value on both channels
    pub fn mono(value: f64) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Average of both channels
    pub fn downmix(&self) -> f64 {
        (self.left + self.right) * 0.5
    }

    /// Apply a function to each channel
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            left: f(self.left),
            right: f(self.right),
        }
    }

    /// Largest absolute channel value
    pub fn peak(&self) -> f64 {
        self.left.abs().max(self.right.abs())
    }

    pub fn channel(&self, index: usize) -> f64 {
        if index == 0 {
            self.left
        } else {
            self.right
        }
    }
}

impl Add for Frame {
    type Output = Frame;

    fn add(self, rhs: Frame) -> Frame {
        Frame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for Frame {
    fn add_assign(&mut self, rhs: Frame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f64> for Frame {
    type Output = Frame;

    fn mul(self, rhs: f64) -> Frame {
        Frame::new(self.left * rhs, self.right * rhs)
    }
}

/// Semantic classification of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Audio-rate program material
    Audio,

    /// Modulation signal (LFO, envelope carrier); usually routed into a parameter
    Control,
}

/// Definition of a single port (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    /// Unique identifier within the node
    pub id: PortId,

    /// Human-readable name (e.g., "in", "out")
    pub name: String,

    /// Signal type for validation and UI hints
    pub kind: SignalKind,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

/// Definition of an automatable parameter.
///
/// The computed value of a parameter is its automation timeline value plus
/// the sum of every signal connected into it, clamped to `[min, max]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl ParamDef {
    pub fn new(id: ParamId, name: impl Into<String>, default: f64) -> Self {
        Self {
            id,
            name: name.into(),
            default,
            min: f64::MIN,
            max: f64::MAX,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Specification of all ports and parameters of a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    pub params: Vec<ParamDef>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn param_by_name(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn input_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.id == id)
    }

    pub fn param_by_id(&self, id: ParamId) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.id == id)
    }
}

/// Runtime port values container
#[derive(Debug, Clone, Default)]
pub struct PortValues {
    pub values: HashMap<PortId, Frame>,
}

impl PortValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PortId) -> Option<Frame> {
        self.values.get(&id).copied()
    }

    /// Value of a port, silence when nothing is connected
    pub fn frame(&self, id: PortId) -> Frame {
        self.values.get(&id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, id: PortId, value: Frame) {
        self.values.insert(id, value);
    }

    /// Accumulate (sum) a value into a port (for input mixing)
    pub fn accumulate(&mut self, id: PortId, value: Frame) {
        *self.values.entry(id).or_default() += value;
    }

    pub fn has(&self, id: PortId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Computed parameter values for one sample
#[derive(Debug, Clone, Default)]
pub struct ParamValues {
    pub values: HashMap<ParamId, f64>,
}

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or(&self, id: ParamId, default: f64) -> f64 {
        self.values.get(&id).copied().unwrap_or(default)
    }

    pub fn set(&mut self, id: ParamId, value: f64) {
        self.values.insert(id, value);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Timing information handed to a node for each processed sample
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Graph time of the sample being rendered, in seconds
    pub time: f64,
    pub sample_rate: f64,
}

/// Start/stop window of a scheduled source node.
///
/// A source produces output only while `start <= time < stop`. Starting is
/// one-shot; a later `stop` call replaces an earlier one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceSchedule {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl SourceSchedule {
    pub fn start_at(&mut self, time: f64) {
        if self.start.is_none() {
            self.start = Some(time);
        }
    }

    pub fn stop_at(&mut self, time: f64) {
        self.stop = Some(time);
    }

    pub fn is_active(&self, time: f64) -> bool {
        let started = self.start.map_or(false, |s| time >= s);
        let stopped = self.stop.map_or(false, |s| time >= s);
        started && !stopped
    }

    pub fn has_ended(&self, time: f64) -> bool {
        self.stop.map_or(false, |s| time >= s)
    }
}

/// Downcasting support for nodes stored behind `Box<dyn AudioNode>`
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Type-erased processing node interface for the signal graph
pub trait AudioNode: AsAny + Send {
    /// Returns the node's port and parameter specification
    fn port_spec(&self) -> &PortSpec;

    /// Process one sample given input port values and computed parameters
    fn tick(
        &mut self,
        ctx: &TickContext,
        inputs: &PortValues,
        params: &ParamValues,
        outputs: &mut PortValues,
    );

    /// Reset internal state
    fn reset(&mut self);

    /// Set sample rate
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Start/stop window for source nodes
    fn schedule(&self) -> Option<&SourceSchedule> {
        None
    }

    fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        None
    }

    /// Whether the node's output depends only on past input.
    ///
    /// Edges into a delay line do not constrain execution order, which is
    /// what allows feedback loops through it.
    fn is_delay_line(&self) -> bool {
        false
    }

    /// Node type identifier
    fn node_type(&self) -> &'static str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_arithmetic() {
        let a = Frame::new(1.0, 2.0);
        let b = Frame::mono(0.5);
        assert_eq!(a + b, Frame::new(1.5, 2.5));
        assert_eq!(a * 2.0, Frame::new(2.0, 4.0));
        assert!((a.downmix() - 1.5).abs() < 1e-12);
        assert!((Frame::new(-3.0, 2.0).peak() - 3.0).abs() < 1e-12);

        let mut c = Frame::SILENCE;
        c += a;
        assert_eq!(c, a);
    }

    #[test]
    fn test_port_values() {
        let mut pv = PortValues::new();
        pv.set(0, Frame::mono(1.0));
        assert_eq!(pv.get(0), Some(Frame::mono(1.0)));
        assert_eq!(pv.get(1), None);
        assert_eq!(pv.frame(1), Frame::SILENCE);

        pv.accumulate(0, Frame::mono(0.5));
        assert_eq!(pv.frame(0), Frame::mono(1.5));
        assert!(pv.has(0));

        pv.clear();
        assert!(!pv.has(0));
    }

    #[test]
    fn test_param_values_default() {
        let mut pv = ParamValues::new();
        assert_eq!(pv.get_or(3, 7.0), 7.0);
        pv.set(3, 1.0);
        assert_eq!(pv.get_or(3, 7.0), 1.0);
    }

    #[test]
    fn test_port_spec_lookup() {
        let spec = PortSpec {
            inputs: vec![PortDef::new(0, "in", SignalKind::Audio)],
            outputs: vec![PortDef::new(10, "out", SignalKind::Audio)],
            params: vec![ParamDef::new(0, "gain", 1.0).with_range(0.0, 2.0)],
        };

        assert!(spec.input_by_name("in").is_some());
        assert!(spec.input_by_name("nonexistent").is_none());
        assert!(spec.output_by_id(10).is_some());
        assert!(spec.output_by_id(0).is_none());
        let gain = spec.param_by_name("gain").unwrap();
        assert_eq!(gain.max, 2.0);
        assert!(spec.param_by_id(0).is_some());
    }

    #[test]
    fn test_source_schedule_window() {
        let mut schedule = SourceSchedule::default();
        assert!(!schedule.is_active(0.0));

        schedule.start_at(1.0);
        schedule.start_at(5.0); // one-shot
        assert_eq!(schedule.start, Some(1.0));
        assert!(!schedule.is_active(0.5));
        assert!(schedule.is_active(1.0));

        schedule.stop_at(2.0);
        assert!(schedule.is_active(1.999));
        assert!(!schedule.is_active(2.0));
        assert!(schedule.has_ended(2.0));
        assert!(!schedule.has_ended(1.5));
    }
}
