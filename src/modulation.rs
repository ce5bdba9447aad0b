//! Modulation Busses
//!
//! Merges any number of modulation outputs into the single bus a voice wires
//! into a target parameter.

use crate::error::Result;
use crate::graph::{NodeId, PortRef, SignalGraph};
use crate::nodes::Gain;

/// A (possibly combined) modulation route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationBus {
    /// Port carrying the modulation signal
    pub output: PortRef,
    /// Averaging mixer, present only when two or more sources were combined
    pub mixer: Option<NodeId>,
}

/// Combine modulation sources into one bus.
///
/// - no sources: `None`
/// - one source: that source's port, no mixer
/// - N sources: a gain node of `1/N` with every source connected into it
pub fn combine_lfos(graph: &mut SignalGraph, sources: &[PortRef]) -> Result<Option<ModulationBus>> {
    match sources {
        [] => Ok(None),
        [single] => Ok(Some(ModulationBus {
            output: *single,
            mixer: None,
        })),
        many => {
            let mixer = graph.add("lfo_mixer", Gain::new(1.0 / many.len() as f64));
            for source in many {
                graph.connect(*source, mixer.in_("in"))?;
            }
            Ok(Some(ModulationBus {
                output: mixer.out("out"),
                mixer: Some(mixer.id()),
            }))
        }
    }
}
