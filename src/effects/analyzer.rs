//! Visualization taps
//!
//! Passthrough processors that expose snapshots of the signal to a display
//! loop. Polling is cooperative: a poll that finds no newly rendered frames
//! returns `None` and the display simply skips that frame.

use super::{Effect, EffectNodes, NodeGroup};
use crate::config::{read_number, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, SignalGraph};
use crate::nodes::Analyser;
use serde::{Deserialize, Serialize};

const DEFAULT_SMOOTHING: f64 = 0.8;

/// Nearest power of two within the analyser's range; invalid sizes fall
/// back to the default
pub fn clamp_fft_size(size: f64) -> usize {
    if !size.is_finite() || size <= 0.0 {
        return Analyser::DEFAULT_FFT_SIZE;
    }
    let exponent = size.log2().round().clamp(
        (Analyser::MIN_FFT_SIZE as f64).log2(),
        (Analyser::MAX_FFT_SIZE as f64).log2(),
    );
    1usize << exponent as u32
}

/// Smoothing constant clamped to `[0, 1]`; NaN falls back to the default
pub fn clamp_smoothing(smoothing: f64) -> f64 {
    if smoothing.is_nan() {
        DEFAULT_SMOOTHING
    } else {
        smoothing.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    pub fft_size: usize,
    pub smoothing: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: Analyser::DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl AnalyzerConfig {
    /// Read `{prefix}.fftSize` and `{prefix}.smoothing`
    pub fn read(source: &dyn ParameterSource, prefix: &str) -> Self {
        let d = Self::default();
        let size = read_number(source, &format!("{}.fftSize", prefix), d.fft_size as f64);
        let smoothing = read_number(source, &format!("{}.smoothing", prefix), d.smoothing);
        Self {
            fft_size: clamp_fft_size(size),
            smoothing: clamp_smoothing(smoothing),
        }
    }
}

/// Shared plumbing of both taps
struct Tap {
    source: SharedSource,
    prefix: &'static str,
    group: NodeGroup,
    analyser: Option<NodeId>,
    last_polled: Option<u64>,
}

impl Tap {
    fn new(source: SharedSource, prefix: &'static str) -> Self {
        Self {
            source,
            prefix,
            group: NodeGroup::new(),
            analyser: None,
            last_polled: None,
        }
    }

    fn config(&self) -> AnalyzerConfig {
        AnalyzerConfig::read(self.source.as_ref(), self.prefix)
    }

    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let io = self.group.reset(graph, self.prefix);
        let analyser = self
            .group
            .add(graph, format!("{}_analyser", self.prefix), Analyser::new());
        graph.connect(io.send(), analyser.in_("in"))?;
        graph.connect(analyser.out("out"), io.ret())?;

        self.analyser = Some(analyser.id());
        self.last_polled = None;
        self.apply(graph);
        Ok(io)
    }

    fn apply(&self, graph: &mut SignalGraph) {
        let config = self.config();
        if let Some(analyser) = self.analyser.and_then(|n| graph.node_mut::<Analyser>(n)) {
            analyser.set_fft_size(config.fft_size);
            analyser.set_smoothing(config.smoothing);
        }
    }

    /// The analyser, if frames were rendered since the previous poll
    fn fresh<'g>(&mut self, graph: &'g mut SignalGraph) -> Option<&'g mut Analyser> {
        let frames = graph.frames_rendered();
        if self.last_polled == Some(frames) {
            return None;
        }
        let analyser = graph.node_mut::<Analyser>(self.analyser?)?;
        self.last_polled = Some(frames);
        Some(analyser)
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.analyser = None;
        self.last_polled = None;
    }
}

/// Smoothed, Blackman-windowed magnitude spectrum in dB
pub struct SpectrumAnalyzer {
    tap: Tap,
}

impl SpectrumAnalyzer {
    pub fn new(source: SharedSource) -> Self {
        Self {
            tap: Tap::new(source, "spectrum"),
        }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.tap.config()
    }

    pub fn analyser(&self) -> Option<NodeId> {
        self.tap.analyser
    }

    /// Spectrum of the latest window, or `None` when nothing new was rendered
    pub fn poll(&mut self, graph: &mut SignalGraph) -> Option<Vec<f32>> {
        self.tap.fresh(graph).map(|a| a.frequency_data())
    }

    /// Spectrum scaled to bytes across the analyser's decibel range
    pub fn poll_bytes(&mut self, graph: &mut SignalGraph) -> Option<Vec<u8>> {
        self.tap.fresh(graph).map(|a| a.byte_frequency_data())
    }
}

impl Effect for SpectrumAnalyzer {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        self.tap.initialize(graph)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        self.tap.apply(graph);
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.tap.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.tap.teardown(graph);
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}

/// Time-domain waveform snapshot
pub struct Oscilloscope {
    tap: Tap,
}

impl Oscilloscope {
    pub fn new(source: SharedSource) -> Self {
        Self {
            tap: Tap::new(source, "oscilloscope"),
        }
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.tap.config()
    }

    pub fn analyser(&self) -> Option<NodeId> {
        self.tap.analyser
    }

    /// Latest `fft_size` samples, or `None` when nothing new was rendered
    pub fn poll(&mut self, graph: &mut SignalGraph) -> Option<Vec<f32>> {
        self.tap.fresh(graph).map(|a| a.time_domain_data())
    }
}

impl Effect for Oscilloscope {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        self.tap.initialize(graph)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        self.tap.apply(graph);
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.tap.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.tap.teardown(graph);
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapParameterSource;
    use crate::nodes::{Oscillator, Waveform};
    use std::sync::Arc;

    #[test]
    fn test_clamp_fft_size() {
        assert_eq!(clamp_fft_size(2048.0), 2048);
        assert_eq!(clamp_fft_size(1000.0), 1024);
        assert_eq!(clamp_fft_size(1600.0), 2048);
        assert_eq!(clamp_fft_size(3.0), 32);
        assert_eq!(clamp_fft_size(1e9), 32768);
        assert_eq!(clamp_fft_size(f64::NAN), 2048);
        assert_eq!(clamp_fft_size(f64::INFINITY), 2048);
        assert_eq!(clamp_fft_size(-64.0), 2048);
    }

    #[test]
    fn test_clamp_smoothing() {
        assert_eq!(clamp_smoothing(0.5), 0.5);
        assert_eq!(clamp_smoothing(-1.0), 0.0);
        assert_eq!(clamp_smoothing(4.0), 1.0);
        assert_eq!(clamp_smoothing(f64::NAN), DEFAULT_SMOOTHING);
    }

    #[test]
    fn test_config_from_source() {
        let source = MapParameterSource::from_pairs([
            ("spectrum.fftSize", 500.0),
            ("spectrum.smoothing", 2.0),
        ]);
        let config = AnalyzerConfig::read(&source, "spectrum");
        assert_eq!(config.fft_size, 512);
        assert_eq!(config.smoothing, 1.0);
    }

    #[test]
    fn test_poll_only_after_render() {
        let source = Arc::new(MapParameterSource::from_pairs([("spectrum.fftSize", 256.0)]));
        let mut graph = SignalGraph::new(8000.0);
        let mut spectrum = SpectrumAnalyzer::new(source);
        let io = spectrum.initialize(&mut graph).unwrap();

        let osc = graph.add("osc", Oscillator::new(Waveform::Sine, 1000.0));
        graph.connect(osc.out("out"), io.input_port()).unwrap();
        let dest = graph.destination().in_("in");
        graph.connect(io.output_port(), dest).unwrap();
        graph.start(osc.id(), 0.0);

        assert!(spectrum.poll(&mut graph).is_some());
        assert!(spectrum.poll(&mut graph).is_none());

        graph.render(256);
        let bins = spectrum.poll(&mut graph).unwrap();
        assert_eq!(bins.len(), 128);
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // 1 kHz at 8 kHz / 256 points
        assert_eq!(peak, 32);
        assert!(spectrum.poll(&mut graph).is_none());
    }

    #[test]
    fn test_oscilloscope_passthrough() {
        let mut graph = SignalGraph::new(8000.0);
        let mut scope = Oscilloscope::new(Arc::new(MapParameterSource::from_pairs([(
            "oscilloscope.fftSize",
            32.0,
        )])));
        let io = scope.initialize(&mut graph).unwrap();
        let osc = graph.add("osc", Oscillator::new(Waveform::Square, 100.0));
        graph.connect(osc.out("out"), io.input_port()).unwrap();
        let dest = graph.destination().in_("in");
        graph.connect(io.output_port(), dest).unwrap();
        graph.start(osc.id(), 0.0);

        let out = graph.render(64);
        let snapshot = scope.poll(&mut graph).unwrap();
        assert_eq!(snapshot.len(), 32);
        for (s, f) in snapshot.iter().zip(&out[32..]) {
            assert!((*s as f64 - f.left).abs() < 1e-6);
        }
    }
}
