//! Layer 2: Signal Graph
//!
//! This module provides the explicit directed graph that all synthesis and
//! effect code wires itself into. Nodes are processing primitives; cables
//! connect an output port either to an input port or to an automatable
//! parameter, where the signal is added to the parameter's timeline value.
//!
//! The graph renders sample by sample in topological order. Feedback loops are
//! legal only when they pass through a delay line (a node whose output depends
//! on past input only); any other cycle is rejected when the closing cable is
//! connected.

use crate::automation::AudioParam;
use crate::error::{Result, SynthError};
use crate::port::{
    AudioNode, Frame, ParamId, ParamValues, PortId, PortSpec, PortValues, TickContext,
};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, DefaultKey, SlotMap};
use std::collections::{HashMap, VecDeque};

/// Unique identifier for a node in the graph
pub type NodeId = DefaultKey;

new_key_type! {
    /// Unique identifier for a cable; stays valid while other cables come and go
    pub struct CableId;
}

/// Number of frames between automation housekeeping passes
pub const RENDER_QUANTUM: usize = 128;

/// Reference to a specific port on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub port: PortId,
}

/// Reference to an automatable parameter on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamRef {
    pub node: NodeId,
    pub param: ParamId,
}

/// Destination of a cable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Port(PortRef),
    Param(ParamRef),
}

impl Target {
    pub fn node(&self) -> NodeId {
        match self {
            Target::Port(p) => p.node,
            Target::Param(p) => p.node,
        }
    }
}

impl From<PortRef> for Target {
    fn from(port: PortRef) -> Self {
        Target::Port(port)
    }
}

impl From<ParamRef> for Target {
    fn from(param: ParamRef) -> Self {
        Target::Param(param)
    }
}

/// A cable connecting an output port to an input port or parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub from: PortRef,
    pub to: Target,
}

/// Internal node representation
struct Node {
    module: Box<dyn AudioNode>,
    name: String,
    params: Vec<(ParamId, AudioParam)>,
}

impl Node {
    fn param(&self, id: ParamId) -> Option<&AudioParam> {
        self.params.iter().find(|(p, _)| *p == id).map(|(_, a)| a)
    }

    fn param_mut(&mut self, id: ParamId) -> Option<&mut AudioParam> {
        self.params.iter_mut().find(|(p, _)| *p == id).map(|(_, a)| a)
    }
}

/// Handle to a node for ergonomic port references
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    spec: PortSpec,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reference an output port by name
    pub fn out(&self, name: &str) -> PortRef {
        let port = self
            .spec
            .output_by_name(name)
            .unwrap_or_else(|| panic!("Unknown output port: {}", name));
        PortRef {
            node: self.id,
            port: port.id,
        }
    }

    /// Reference an input port by name
    pub fn in_(&self, name: &str) -> PortRef {
        let port = self
            .spec
            .input_by_name(name)
            .unwrap_or_else(|| panic!("Unknown input port: {}", name));
        PortRef {
            node: self.id,
            port: port.id,
        }
    }

    /// Reference an automatable parameter by name
    pub fn param(&self, name: &str) -> ParamRef {
        let param = self
            .spec
            .param_by_name(name)
            .unwrap_or_else(|| panic!("Unknown parameter: {}", name));
        ParamRef {
            node: self.id,
            param: param.id,
        }
    }

    /// Get the port specification
    pub fn spec(&self) -> &PortSpec {
        &self.spec
    }
}

/// The directed signal graph, its automation state and its render clock
pub struct SignalGraph {
    nodes: SlotMap<NodeId, Node>,
    cables: SlotMap<CableId, Cable>,

    // Execution state
    execution_order: Vec<NodeId>,
    routes: HashMap<Target, Vec<PortRef>>,
    buffers: HashMap<PortRef, Frame>,
    dirty: bool,
    scratch_inputs: PortValues,
    scratch_outputs: PortValues,
    scratch_params: ParamValues,

    // Clock
    sample_rate: f64,
    frames_rendered: u64,

    destination: NodeHandle,
}

impl SignalGraph {
    /// Create a graph containing only its destination node
    pub fn new(sample_rate: f64) -> Self {
        let mut nodes = SlotMap::new();
        let mut destination = crate::nodes::Destination::new();
        destination.set_sample_rate(sample_rate);
        let spec = destination.port_spec().clone();
        let id = nodes.insert(Node {
            params: Vec::new(),
            module: Box::new(destination),
            name: "destination".to_string(),
        });

        Self {
            nodes,
            cables: SlotMap::with_key(),
            execution_order: Vec::new(),
            routes: HashMap::new(),
            buffers: HashMap::new(),
            dirty: true,
            scratch_inputs: PortValues::new(),
            scratch_outputs: PortValues::new(),
            scratch_params: ParamValues::new(),
            sample_rate,
            frames_rendered: 0,
            destination: NodeHandle { id, spec },
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Graph time of the next frame to be rendered, in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// The final sink whose input is the graph's output
    pub fn destination(&self) -> &NodeHandle {
        &self.destination
    }

    /// Add a node to the graph
    pub fn add<M: AudioNode + 'static>(&mut self, name: impl Into<String>, module: M) -> NodeHandle {
        self.add_boxed(name, Box::new(module))
    }

    /// Add a boxed node to the graph
    pub fn add_boxed(&mut self, name: impl Into<String>, mut module: Box<dyn AudioNode>) -> NodeHandle {
        module.set_sample_rate(self.sample_rate);
        let spec = module.port_spec().clone();
        let params = spec
            .params
            .iter()
            .map(|def| (def.id, AudioParam::new(def)))
            .collect();
        let id = self.nodes.insert(Node {
            module,
            name: name.into(),
            params,
        });
        self.invalidate();
        NodeHandle { id, spec }
    }

    /// Remove a node and every cable touching it
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if node == self.destination.id {
            return Err(SynthError::InvalidNode);
        }
        if self.nodes.remove(node).is_none() {
            return Err(SynthError::InvalidNode);
        }

        self.cables
            .retain(|_, cable| cable.from.node != node && cable.to.node() != node);
        self.buffers.retain(|port, _| port.node != node);

        self.invalidate();
        Ok(())
    }

    /// Remove several nodes, ignoring ids that are already gone
    pub fn remove_all(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            let _ = self.remove(node);
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Connect an output port to an input port or parameter.
    ///
    /// Fails if either end is unknown or if the cable would close a loop that
    /// does not pass through a delay line.
    pub fn connect(&mut self, from: PortRef, to: impl Into<Target>) -> Result<CableId> {
        let to = to.into();
        self.validate_output_port(from)?;
        self.validate_target(to)?;

        let id = self.cables.insert(Cable { from, to });
        if let Err(e) = self.topological_sort() {
            self.cables.remove(id);
            return Err(e);
        }
        self.invalidate();
        Ok(id)
    }

    /// Disconnect a cable by ID
    pub fn disconnect(&mut self, cable_id: CableId) -> Result<()> {
        if self.cables.remove(cable_id).is_none() {
            return Err(SynthError::InvalidPort(format!("{:?}", cable_id)));
        }
        self.invalidate();
        Ok(())
    }

    /// Disconnect every cable leaving `node`, returning how many were removed
    pub fn disconnect_outputs(&mut self, node: NodeId) -> usize {
        let before = self.cables.len();
        self.cables.retain(|_, cable| cable.from.node != node);
        let removed = before - self.cables.len();
        if removed > 0 {
            self.invalidate();
        }
        removed
    }

    /// Disconnect every cable running from `from` to `to`
    pub fn disconnect_between(&mut self, from: NodeId, to: NodeId) -> usize {
        let before = self.cables.len();
        self.cables
            .retain(|_, cable| !(cable.from.node == from && cable.to.node() == to));
        let removed = before - self.cables.len();
        if removed > 0 {
            self.invalidate();
        }
        removed
    }

    /// Whether a cable runs from `from` to `to`
    pub fn is_connected(&self, from: PortRef, to: impl Into<Target>) -> bool {
        let to = to.into();
        self.cables
            .values()
            .any(|cable| cable.from == from && cable.to == to)
    }

    /// Every output feeding a target
    pub fn sources_of(&self, to: impl Into<Target>) -> Vec<PortRef> {
        let to = to.into();
        self.cables
            .values()
            .filter(|cable| cable.to == to)
            .map(|cable| cable.from)
            .collect()
    }

    /// Every target fed by a node
    pub fn targets_of(&self, node: NodeId) -> Vec<Target> {
        self.cables
            .values()
            .filter(|cable| cable.from.node == node)
            .map(|cable| cable.to)
            .collect()
    }

    /// Access an automatable parameter
    pub fn param(&self, param: ParamRef) -> Option<&AudioParam> {
        self.nodes.get(param.node).and_then(|n| n.param(param.param))
    }

    /// Mutable access to an automatable parameter
    pub fn param_mut(&mut self, param: ParamRef) -> Option<&mut AudioParam> {
        self.nodes.get_mut(param.node).and_then(|n| n.param_mut(param.param))
    }

    /// Set a parameter's intrinsic value
    pub fn set_param(&mut self, param: ParamRef, value: f64) {
        if let Some(p) = self.param_mut(param) {
            p.set_value(value);
        }
    }

    pub fn set_value_at_time(&mut self, param: ParamRef, value: f64, time: f64) {
        if let Some(p) = self.param_mut(param) {
            p.set_value_at_time(value, time);
        }
    }

    pub fn linear_ramp_to_value_at_time(&mut self, param: ParamRef, value: f64, time: f64) {
        if let Some(p) = self.param_mut(param) {
            p.linear_ramp_to_value_at_time(value, time);
        }
    }

    pub fn cancel_scheduled_values(&mut self, param: ParamRef, time: f64) {
        if let Some(p) = self.param_mut(param) {
            p.cancel_scheduled_values(time);
        }
    }

    /// Cancel pending automation from `time` on and pin the reached value
    pub fn cancel_and_hold_at_time(&mut self, param: ParamRef, time: f64) -> Option<f64> {
        self.param_mut(param).map(|p| p.cancel_and_hold_at_time(time))
    }

    /// Schedule a parameter change at the current graph time
    pub fn set_value_now(&mut self, param: ParamRef, value: f64) {
        let now = self.current_time();
        self.set_value_at_time(param, value, now);
    }

    /// Automated value of a parameter at `time`, excluding modulation inputs
    pub fn param_value_at(&self, param: ParamRef, time: f64) -> Option<f64> {
        self.param(param).map(|p| p.value_at(time))
    }

    /// Downcast a node to its concrete type
    pub fn node<T: AudioNode + 'static>(&self, node: NodeId) -> Option<&T> {
        self.nodes
            .get(node)
            .and_then(|n| n.module.as_ref().as_any().downcast_ref::<T>())
    }

    /// Mutably downcast a node to its concrete type
    pub fn node_mut<T: AudioNode + 'static>(&mut self, node: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(node)
            .and_then(|n| n.module.as_mut().as_any_mut().downcast_mut::<T>())
    }

    /// Start a source node at `time`
    pub fn start(&mut self, node: NodeId, time: f64) {
        if let Some(schedule) = self.nodes.get_mut(node).and_then(|n| n.module.schedule_mut()) {
            schedule.start_at(time);
        }
    }

    /// Stop a source node at `time`, or immediately when `None`
    pub fn stop(&mut self, node: NodeId, time: Option<f64>) {
        let at = time.unwrap_or_else(|| self.current_time());
        if let Some(schedule) = self.nodes.get_mut(node).and_then(|n| n.module.schedule_mut()) {
            schedule.stop_at(at);
        }
    }

    /// Whether a source node has passed its stop time
    pub fn has_ended(&self, node: NodeId) -> bool {
        let now = self.current_time();
        self.nodes
            .get(node)
            .and_then(|n| n.module.schedule())
            .map_or(false, |s| s.has_ended(now))
    }

    /// Get node name
    pub fn get_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.name.as_str())
    }

    /// Get number of nodes, including the destination
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get number of cables
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    /// Iterate over all cables
    pub fn cables(&self) -> impl Iterator<Item = (CableId, &Cable)> {
        self.cables.iter()
    }

    /// Execution order (after compile)
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str, &dyn AudioNode)> {
        self.nodes
            .iter()
            .map(|(id, node)| (id, node.name.as_str(), node.module.as_ref()))
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }

    fn validate_output_port(&self, port_ref: PortRef) -> Result<()> {
        let node = self.nodes.get(port_ref.node).ok_or(SynthError::InvalidNode)?;
        node.module
            .port_spec()
            .output_by_id(port_ref.port)
            .ok_or_else(|| SynthError::InvalidPort(format!("{}:{}", node.name, port_ref.port)))?;
        Ok(())
    }

    fn validate_target(&self, target: Target) -> Result<()> {
        match target {
            Target::Port(port_ref) => {
                let node = self.nodes.get(port_ref.node).ok_or(SynthError::InvalidNode)?;
                node.module.port_spec().input_by_id(port_ref.port).ok_or_else(|| {
                    SynthError::InvalidPort(format!("{}:{}", node.name, port_ref.port))
                })?;
            }
            Target::Param(param_ref) => {
                let node = self.nodes.get(param_ref.node).ok_or(SynthError::InvalidNode)?;
                node.param(param_ref.param).ok_or_else(|| {
                    SynthError::InvalidParam(format!("{}:{}", node.name, param_ref.param))
                })?;
            }
        }
        Ok(())
    }

    /// Compile the graph into an executable order
    pub fn compile(&mut self) -> Result<()> {
        let order = self.topological_sort()?;
        self.execution_order = order;

        self.routes.clear();
        for cable in self.cables.values() {
            self.routes.entry(cable.to).or_default().push(cable.from);
        }

        for (id, node) in &self.nodes {
            for output in &node.module.port_spec().outputs {
                self.buffers
                    .entry(PortRef {
                        node: id,
                        port: output.id,
                    })
                    .or_default();
            }
        }

        self.dirty = false;
        Ok(())
    }

    fn topological_sort(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = self.nodes.keys().map(|k| (k, 0)).collect();
        let mut successors: HashMap<NodeId, Vec<NodeId>> =
            self.nodes.keys().map(|k| (k, vec![])).collect();

        for cable in self.cables.values() {
            let to = cable.to.node();
            // A delay line reads its input after emitting delayed output
            let breaks_cycle = self
                .nodes
                .get(to)
                .map_or(false, |n| n.module.is_delay_line());
            if breaks_cycle {
                continue;
            }
            *in_degree.entry(to).or_insert(0) += 1;
            successors.entry(cable.from.node).or_default().push(to);
        }

        // Kahn's algorithm
        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(node);
            if let Some(succs) = successors.get(&node) {
                for succ in succs {
                    if let Some(deg) = in_degree.get_mut(succ) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push_back(*succ);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let in_cycle: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(SynthError::CycleDetected { nodes: in_cycle });
        }

        Ok(result)
    }

    /// Render one frame and advance the clock
    pub fn tick(&mut self) -> Frame {
        if self.dirty && self.compile().is_err() {
            self.frames_rendered += 1;
            return Frame::SILENCE;
        }

        let ctx = TickContext {
            time: self.current_time(),
            sample_rate: self.sample_rate,
        };

        let mut inputs = std::mem::take(&mut self.scratch_inputs);
        let mut outputs = std::mem::take(&mut self.scratch_outputs);
        let mut params = std::mem::take(&mut self.scratch_params);

        for index in 0..self.execution_order.len() {
            let node_id = self.execution_order[index];
            self.gather_inputs(node_id, &mut inputs);
            self.gather_params(node_id, ctx.time, &mut params);
            outputs.clear();

            if let Some(node) = self.nodes.get_mut(node_id) {
                node.module.tick(&ctx, &inputs, &params, &mut outputs);
            }

            self.scatter_outputs(node_id, &outputs);
        }

        self.scratch_inputs = inputs;
        self.scratch_outputs = outputs;
        self.scratch_params = params;

        self.frames_rendered += 1;
        if self.frames_rendered % RENDER_QUANTUM as u64 == 0 {
            self.prune_automation();
        }

        self.read_output()
    }

    /// Render into a buffer of frames
    pub fn process(&mut self, output: &mut [Frame]) {
        for frame in output.iter_mut() {
            *frame = self.tick();
        }
    }

    /// Render `frames` frames into a new buffer
    pub fn render(&mut self, frames: usize) -> Vec<Frame> {
        let mut output = vec![Frame::SILENCE; frames];
        self.process(&mut output);
        output
    }

    fn gather_inputs(&self, node_id: NodeId, values: &mut PortValues) {
        values.clear();
        let node = match self.nodes.get(node_id) {
            Some(n) => n,
            None => return,
        };

        for input in &node.module.port_spec().inputs {
            let port_ref = PortRef {
                node: node_id,
                port: input.id,
            };
            // Sum all incoming cables
            if let Some(sources) = self.routes.get(&Target::Port(port_ref)) {
                let mut sum = Frame::SILENCE;
                for source in sources {
                    sum += self.buffers.get(source).copied().unwrap_or_default();
                }
                values.set(input.id, sum);
            }
        }
    }

    fn gather_params(&self, node_id: NodeId, time: f64, values: &mut ParamValues) {
        values.clear();
        let node = match self.nodes.get(node_id) {
            Some(n) => n,
            None => return,
        };

        for (id, param) in &node.params {
            let mut value = param.value_at(time);
            let param_ref = ParamRef {
                node: node_id,
                param: *id,
            };
            if let Some(sources) = self.routes.get(&Target::Param(param_ref)) {
                for source in sources {
                    value += self
                        .buffers
                        .get(source)
                        .map(Frame::downmix)
                        .unwrap_or(0.0);
                }
            }
            values.set(*id, param.clamp(value));
        }
    }

    fn scatter_outputs(&mut self, node_id: NodeId, outputs: &PortValues) {
        for (&port_id, &value) in &outputs.values {
            let port_ref = PortRef {
                node: node_id,
                port: port_id,
            };
            self.buffers.insert(port_ref, value);
        }
    }

    fn read_output(&self) -> Frame {
        self.buffers
            .get(&self.destination.out("out"))
            .copied()
            .unwrap_or_default()
    }

    fn prune_automation(&mut self) {
        let now = self.current_time();
        for node in self.nodes.values_mut() {
            for (_, param) in &mut node.params {
                param.timeline_mut().prune_before(now);
            }
        }
    }

    /// Reset all node state and rewind nothing: the clock keeps running
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.module.reset();
        }
        for value in self.buffers.values_mut() {
            *value = Frame::SILENCE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ConstantSource, Delay, Gain};

    #[test]
    fn test_add_node() {
        let mut graph = SignalGraph::new(44100.0);
        let handle = graph.add("gain", Gain::new(1.0));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.get_name(handle.id()), Some("gain"));
    }

    #[test]
    fn test_connect_and_render() {
        let mut graph = SignalGraph::new(44100.0);
        let source = graph.add("dc", ConstantSource::new(0.5));
        let gain = graph.add("gain", Gain::new(2.0));
        let dest = graph.destination().in_("in");

        graph.connect(source.out("out"), gain.in_("in")).unwrap();
        graph.connect(gain.out("out"), dest).unwrap();
        graph.start(source.id(), 0.0);

        let out = graph.render(4);
        assert!(out.iter().all(|f| (f.left - 1.0).abs() < 1e-12));
        assert_eq!(graph.frames_rendered(), 4);
    }

    #[test]
    fn test_param_modulation_is_additive() {
        let mut graph = SignalGraph::new(44100.0);
        let source = graph.add("dc", ConstantSource::new(1.0));
        let modulator = graph.add("mod", ConstantSource::new(0.25));
        let gain = graph.add("gain", Gain::new(0.5));
        graph.connect(source.out("out"), gain.in_("in")).unwrap();
        graph.connect(modulator.out("out"), gain.param("gain")).unwrap();
        graph
            .connect(gain.out("out"), graph.destination().in_("in"))
            .unwrap();
        graph.start(source.id(), 0.0);
        graph.start(modulator.id(), 0.0);

        let out = graph.tick();
        assert!((out.left - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_automation_is_sample_accurate() {
        let mut graph = SignalGraph::new(100.0);
        let source = graph.add("dc", ConstantSource::new(1.0));
        let gain = graph.add("gain", Gain::new(0.0));
        graph.connect(source.out("out"), gain.in_("in")).unwrap();
        graph
            .connect(gain.out("out"), graph.destination().in_("in"))
            .unwrap();
        graph.start(source.id(), 0.0);
        graph.set_value_at_time(gain.param("gain"), 0.0, 0.0);
        graph.linear_ramp_to_value_at_time(gain.param("gain"), 1.0, 0.1);

        let out = graph.render(12);
        assert!((out[0].left - 0.0).abs() < 1e-9);
        assert!((out[5].left - 0.5).abs() < 1e-9);
        assert!((out[10].left - 1.0).abs() < 1e-9);
        assert!((out[11].left - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_topological_order() {
        let mut graph = SignalGraph::new(44100.0);
        let a = graph.add("a", Gain::new(1.0));
        let b = graph.add("b", Gain::new(1.0));
        let c = graph.add("c", Gain::new(1.0));

        graph.connect(a.out("out"), b.in_("in")).unwrap();
        graph.connect(b.out("out"), c.in_("in")).unwrap();
        graph.compile().unwrap();

        let order = graph.execution_order();
        let pos = |id| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a.id()) < pos(b.id()));
        assert!(pos(b.id()) < pos(c.id()));
    }

    #[test]
    fn test_cycle_without_delay_is_rejected() {
        let mut graph = SignalGraph::new(44100.0);
        let a = graph.add("a", Gain::new(1.0));
        let b = graph.add("b", Gain::new(1.0));

        graph.connect(a.out("out"), b.in_("in")).unwrap();
        let result = graph.connect(b.out("out"), a.in_("in"));
        assert!(matches!(result, Err(SynthError::CycleDetected { .. })));
        assert_eq!(graph.cable_count(), 1);
    }

    #[test]
    fn test_cycle_through_delay_is_allowed() {
        let mut graph = SignalGraph::new(44100.0);
        let delay = graph.add("delay", Delay::new(1.0));
        let feedback = graph.add("feedback", Gain::new(0.5));

        graph.connect(delay.out("out"), feedback.in_("in")).unwrap();
        assert!(graph.connect(feedback.out("out"), delay.in_("in")).is_ok());
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_disconnect_outputs_and_between() {
        let mut graph = SignalGraph::new(44100.0);
        let a = graph.add("a", Gain::new(1.0));
        let b = graph.add("b", Gain::new(1.0));
        let c = graph.add("c", Gain::new(1.0));

        let cable = graph.connect(a.out("out"), b.in_("in")).unwrap();
        graph.connect(a.out("out"), c.in_("in")).unwrap();
        graph.connect(b.out("out"), c.param("gain")).unwrap();
        assert_eq!(graph.cable_count(), 3);
        assert!(graph.is_connected(b.out("out"), c.param("gain")));

        graph.disconnect(cable).unwrap();
        assert!(graph.disconnect(cable).is_err());
        assert_eq!(graph.disconnect_between(b.id(), c.id()), 1);
        assert_eq!(graph.disconnect_outputs(a.id()), 1);
        assert_eq!(graph.cable_count(), 0);
    }

    #[test]
    fn test_remove_node_drops_cables() {
        let mut graph = SignalGraph::new(44100.0);
        let a = graph.add("a", Gain::new(1.0));
        let b = graph.add("b", Gain::new(1.0));
        graph.connect(a.out("out"), b.in_("in")).unwrap();

        graph.remove(a.id()).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.cable_count(), 0);
        assert!(graph.remove(a.id()).is_err());
    }

    #[test]
    fn test_destination_cannot_be_removed() {
        let mut graph = SignalGraph::new(44100.0);
        let id = graph.destination().id();
        assert_eq!(graph.remove(id), Err(SynthError::InvalidNode));
    }

    #[test]
    fn test_source_schedule_through_graph() {
        let mut graph = SignalGraph::new(10.0);
        let source = graph.add("dc", ConstantSource::new(1.0));
        graph
            .connect(source.out("out"), graph.destination().in_("in"))
            .unwrap();
        graph.start(source.id(), 0.2);
        graph.stop(source.id(), Some(0.5));

        let out = graph.render(8);
        let levels: Vec<f64> = out.iter().map(|f| f.left).collect();
        assert_eq!(levels, vec![0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(graph.has_ended(source.id()));
    }

    #[test]
    fn test_downcast_node() {
        let mut graph = SignalGraph::new(44100.0);
        let gain = graph.add("gain", Gain::new(1.0));
        assert!(graph.node::<Gain>(gain.id()).is_some());
        assert!(graph.node_mut::<Delay>(gain.id()).is_none());
    }
}
