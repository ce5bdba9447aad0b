//! Parameter Automation
//!
//! Every automatable parameter owns an [`AutomationTimeline`]: an ordered
//! queue of `{time, value, curve}` events evaluated by the render loop once
//! per sample. Control code only ever schedules; nothing is applied
//! immediately, which keeps envelope and parameter changes sample-accurate.

use crate::port::ParamDef;
use serde::{Deserialize, Serialize};

/// How the value approaches an event's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    /// Jump to the value at the event time
    SetValue,
    /// Ramp linearly from the previous event to reach the value at the event time
    LinearRamp,
}

/// A single scheduled automation point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationEvent {
    pub time: f64,
    pub value: f64,
    pub curve: CurveType,
}

/// Time-ordered automation queue for one parameter
#[derive(Debug, Clone, Default)]
pub struct AutomationTimeline {
    events: Vec<AutomationEvent>,
}

impl AutomationTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Insert an event after any existing events at the same time
    pub fn insert(&mut self, event: AutomationEvent) {
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            curve: CurveType::SetValue,
        });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            curve: CurveType::LinearRamp,
        });
    }

    /// Remove every event at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Evaluate the timeline at `time`, falling back to `intrinsic` before
    /// the first event.
    pub fn value_at(&self, time: f64, intrinsic: f64) -> f64 {
        if self.events.is_empty() {
            return intrinsic;
        }

        let index = self.events.partition_point(|e| e.time <= time);
        let (prev_time, prev_value) = match index {
            0 => (0.0, intrinsic),
            i => (self.events[i - 1].time, self.events[i - 1].value),
        };

        match self.events.get(index) {
            Some(next) if next.curve == CurveType::LinearRamp => {
                let span = next.time - prev_time;
                if span <= 0.0 {
                    return next.value;
                }
                let t = ((time - prev_time) / span).clamp(0.0, 1.0);
                prev_value + (next.value - prev_value) * t
            }
            _ => prev_value,
        }
    }

    /// Drop events that can no longer influence values at or after `time`.
    ///
    /// The newest event at or before `time` is kept as the anchor of any ramp
    /// still in progress.
    pub fn prune_before(&mut self, time: f64) {
        let index = self.events.partition_point(|e| e.time <= time);
        if index > 1 {
            self.events.drain(..index - 1);
        }
    }
}

/// An automatable parameter: intrinsic value, nominal range and timeline
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f64,
    default: f64,
    min: f64,
    max: f64,
    timeline: AutomationTimeline,
}

impl AudioParam {
    pub fn new(def: &ParamDef) -> Self {
        Self {
            value: def.default,
            default: def.default,
            min: def.min,
            max: def.max,
            timeline: AutomationTimeline::new(),
        }
    }

    /// Intrinsic value, used before the first automation event
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = self.clamp(value);
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn timeline(&self) -> &AutomationTimeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut AutomationTimeline {
        &mut self.timeline
    }

    /// Automated value at `time`, excluding connected modulation
    pub fn value_at(&self, time: f64) -> f64 {
        self.timeline.value_at(time, self.value)
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.timeline.set_value_at_time(value, time);
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.timeline.linear_ramp_to_value_at_time(value, time);
    }

    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.timeline.cancel_scheduled_values(time);
    }

    /// Cancel everything pending from `time` on and pin the value the
    /// timeline had reached at `time`.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) -> f64 {
        let held = self.value_at(time);
        self.timeline.cancel_scheduled_values(time);
        self.timeline.set_value_at_time(held, time);
        held
    }
}
