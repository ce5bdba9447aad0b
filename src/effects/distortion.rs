//! Distortion: tanh soft clipping through a waveshaper, blended with the
//! dry signal

use super::{gain_of, Effect, EffectNodes, NodeGroup};
use crate::config::{read_clamped, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, SignalGraph};
use crate::nodes::{Gain, WaveShaper};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Points in the shaping curve
pub const DISTORTION_CURVE_SAMPLES: usize = 1024;

/// Odd soft-clip curve over `x ∈ [-1, 1]`:
/// `tanh(amt·x) / tanh(amt)` with `amt = max(1, drive·10)`
pub fn make_distortion_curve(drive: f64) -> Vec<f64> {
    let amount = (drive * 10.0).max(1.0);
    let norm = amount.tanh();
    let last = (DISTORTION_CURVE_SAMPLES - 1) as f64;
    (0..DISTORTION_CURVE_SAMPLES)
        .map(|i| {
            let x = i as f64 * 2.0 / last - 1.0;
            (amount * x).tanh() / norm
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortionConfig {
    pub drive: f64,
    pub blend: f64,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            drive: 0.5,
            blend: 0.5,
        }
    }
}

impl DistortionConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        Self {
            drive: read_clamped(source, "distortion.drive", d.drive, 0.0, 1.0),
            blend: read_clamped(source, "distortion.blend", d.blend, 0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DistortionNodes {
    shaper: NodeId,
    dry: NodeId,
    wet: NodeId,
}

pub struct Distortion {
    source: SharedSource,
    group: NodeGroup,
    nodes: Option<DistortionNodes>,
    /// Drive the installed curve was built from
    curve_drive: Option<f64>,
}

impl Distortion {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            nodes: None,
            curve_drive: None,
        }
    }

    pub fn config(&self) -> DistortionConfig {
        DistortionConfig::read(self.source.as_ref())
    }

    pub fn shaper(&self) -> Option<NodeId> {
        self.nodes.map(|n| n.shaper)
    }
}

impl Effect for Distortion {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "distortion");

        let curve: Arc<[f64]> = make_distortion_curve(config.drive).into();
        let shaper = self
            .group
            .add(graph, "distortion_shaper", WaveShaper::with_curve(curve));
        let dry = self
            .group
            .add(graph, "distortion_dry", Gain::new(1.0 - config.blend));
        let wet = self.group.add(graph, "distortion_wet", Gain::new(config.blend));

        graph.connect(io.send(), dry.in_("in"))?;
        graph.connect(io.send(), shaper.in_("in"))?;
        graph.connect(shaper.out("out"), wet.in_("in"))?;
        graph.connect(dry.out("out"), io.ret())?;
        graph.connect(wet.out("out"), io.ret())?;

        self.curve_drive = Some(config.drive);
        self.nodes = Some(DistortionNodes {
            shaper: shaper.id(),
            dry: dry.id(),
            wet: wet.id(),
        });
        Ok(io)
    }

    /// Updates the blend; the curve is rebuilt only when drive changed
    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        let nodes = match self.nodes {
            Some(n) => n,
            None => return Ok(()),
        };
        let config = self.config();

        if self.curve_drive != Some(config.drive) {
            if let Some(shaper) = graph.node_mut::<WaveShaper>(nodes.shaper) {
                shaper.set_curve(make_distortion_curve(config.drive).into());
                self.curve_drive = Some(config.drive);
            }
        }
        graph.set_value_now(gain_of(nodes.dry), 1.0 - config.blend);
        graph.set_value_now(gain_of(nodes.wet), config.blend);
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.nodes = None;
        self.curve_drive = None;
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_curve_is_odd() {
        for drive in [0.0, 0.3, 1.0] {
            let curve = make_distortion_curve(drive);
            assert_eq!(curve.len(), DISTORTION_CURVE_SAMPLES);
            for i in 0..DISTORTION_CURVE_SAMPLES {
                assert_abs_diff_eq!(curve[i], -curve[DISTORTION_CURVE_SAMPLES - 1 - i], epsilon = 1e-12);
            }
            assert_abs_diff_eq!(curve[0], -1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(curve[DISTORTION_CURVE_SAMPLES - 1], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_drive_is_mild_tanh() {
        let curve = make_distortion_curve(0.0);
        let norm = 1.0_f64.tanh();
        for (i, y) in curve.iter().enumerate() {
            let x = i as f64 * 2.0 / 1023.0 - 1.0;
            assert_abs_diff_eq!(*y, x.tanh() / norm, epsilon = 1e-12);
        }
        assert!(curve.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_higher_drive_saturates_harder() {
        let soft = make_distortion_curve(0.1);
        let hard = make_distortion_curve(1.0);
        let quarter = DISTORTION_CURVE_SAMPLES * 5 / 8;
        assert!(hard[quarter] > soft[quarter]);
    }

    #[test]
    fn test_curve_regenerated_on_drive_change() {
        let source = Arc::new(MapParameterSource::from_pairs([("distortion.drive", 0.2)]));
        let mut graph = SignalGraph::new(44100.0);
        let mut distortion = Distortion::new(source.clone());
        distortion.initialize(&mut graph).unwrap();
        let shaper = distortion.shaper().unwrap();
        let before = graph.node::<WaveShaper>(shaper).unwrap().curve().cloned().unwrap();

        distortion.update(&mut graph).unwrap();
        let same = graph.node::<WaveShaper>(shaper).unwrap().curve().cloned().unwrap();
        assert!(Arc::ptr_eq(&before, &same));

        source.set("distortion.drive", 0.9);
        distortion.update(&mut graph).unwrap();
        let after = graph.node::<WaveShaper>(shaper).unwrap().curve().cloned().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.as_ref(), make_distortion_curve(0.9).as_slice());
    }
}
