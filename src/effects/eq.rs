//! Five-band parametric EQ with true bypass

use super::{Effect, EffectNodes, NodeGroup};
use crate::config::{read_bool, read_clamped, ParamValue, ParameterSource, SharedSource};
use crate::error::Result;
use crate::graph::{NodeId, ParamRef, PortRef, SignalGraph};
use crate::nodes::{BiquadFilter, FilterType, IN, OUT};
use serde::{Deserialize, Serialize};

/// Band shapes and nominal center frequencies, low to high
pub const EQ_BANDS: [(FilterType, f64); 5] = [
    (FilterType::Lowshelf, 80.0),
    (FilterType::Peaking, 250.0),
    (FilterType::Peaking, 1000.0),
    (FilterType::Peaking, 4000.0),
    (FilterType::Highshelf, 12000.0),
];

const EQ_Q: f64 = 1.0;

/// Band gain limit in dB
const MAX_BAND_GAIN: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqConfig {
    pub enabled: bool,
    /// dB per band
    pub band_gains: [f64; 5],
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            band_gains: [0.0; 5],
        }
    }
}

impl EqConfig {
    pub fn read(source: &dyn ParameterSource) -> Self {
        let d = Self::default();
        let band_gains = std::array::from_fn(|i| {
            read_clamped(
                source,
                &format!("eq.band{}.gain", i),
                d.band_gains[i],
                -MAX_BAND_GAIN,
                MAX_BAND_GAIN,
            )
        });
        Self {
            enabled: read_bool(source, "eq.enabled", d.enabled),
            band_gains,
        }
    }

    pub fn to_params(&self) -> Vec<(String, ParamValue)> {
        let mut params = vec![("eq.enabled".to_string(), self.enabled.into())];
        params.extend(
            self.band_gains
                .iter()
                .enumerate()
                .map(|(i, g)| (format!("eq.band{}.gain", i), (*g).into())),
        );
        params
    }
}

pub struct ParametricEq {
    source: SharedSource,
    group: NodeGroup,
    bands: Vec<NodeId>,
    enabled: bool,
}

impl ParametricEq {
    pub fn new(source: SharedSource) -> Self {
        Self {
            source,
            group: NodeGroup::new(),
            bands: Vec::new(),
            enabled: true,
        }
    }

    pub fn config(&self) -> EqConfig {
        EqConfig::read(self.source.as_ref())
    }

    pub fn bands(&self) -> &[NodeId] {
        &self.bands
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch between the band chain and a direct input → output edge
    pub fn set_enabled(&mut self, graph: &mut SignalGraph, enabled: bool) -> Result<()> {
        self.enabled = enabled;
        self.wire(graph)
    }

    fn wire(&self, graph: &mut SignalGraph) -> Result<()> {
        let io = match self.group.io() {
            Some(io) => io,
            None => return Ok(()),
        };
        graph.disconnect_outputs(io.input);
        for &band in &self.bands {
            graph.disconnect_outputs(band);
        }

        if !self.enabled {
            graph.connect(io.send(), io.ret())?;
            return Ok(());
        }

        let mut previous = io.send();
        for &band in &self.bands {
            graph.connect(previous, PortRef { node: band, port: IN })?;
            previous = PortRef { node: band, port: OUT };
        }
        graph.connect(previous, io.ret())?;
        Ok(())
    }

    fn band_gain(band: NodeId) -> ParamRef {
        ParamRef {
            node: band,
            param: BiquadFilter::GAIN,
        }
    }
}

impl Effect for ParametricEq {
    fn initialize(&mut self, graph: &mut SignalGraph) -> Result<EffectNodes> {
        let config = self.config();
        let io = self.group.reset(graph, "eq");
        self.bands.clear();

        for (i, ((filter_type, frequency), gain)) in
            EQ_BANDS.iter().zip(config.band_gains).enumerate()
        {
            let band = self.group.add(
                graph,
                format!("eq_band{}", i),
                BiquadFilter::new(*filter_type, *frequency, EQ_Q),
            );
            graph.set_param(band.param("gain"), gain);
            self.bands.push(band.id());
        }

        self.enabled = config.enabled;
        self.wire(graph)?;
        Ok(io)
    }

    fn update(&mut self, graph: &mut SignalGraph) -> Result<()> {
        if self.bands.is_empty() {
            return Ok(());
        }
        let config = self.config();
        for (&band, gain) in self.bands.iter().zip(config.band_gains) {
            graph.set_value_now(Self::band_gain(band), gain);
        }
        if config.enabled != self.enabled {
            self.set_enabled(graph, config.enabled)?;
        }
        Ok(())
    }

    fn nodes(&self) -> Option<EffectNodes> {
        self.group.io()
    }

    fn teardown(&mut self, graph: &mut SignalGraph) {
        self.group.teardown(graph);
        self.bands.clear();
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(self.config()).unwrap_or_default()
    }
}
