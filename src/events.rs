use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::config::EventConfig;
use crate::gesture::{GestureLabel, GestureSet};

/// 安定化したジェスチャから導く通知イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    EmergencyStop,
    AttentionRequest,
    MaterialShortage,
    QualityIssue,
}

/// 優先度順
const MAPPING: [(GestureLabel, Event); 4] = [
    (GestureLabel::CrossAboveHead, Event::EmergencyStop),
    (GestureLabel::WaveRight, Event::AttentionRequest),
    (GestureLabel::LeftArmUp, Event::MaterialShortage),
    (GestureLabel::RightArmUp, Event::QualityIssue),
];

impl Event {
    pub fn from_gestures(gestures: &GestureSet) -> Option<Self> {
        MAPPING
            .iter()
            .find(|(label, _)| gestures.contains(label))
            .map(|&(_, event)| event)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Event::EmergencyStop => "emergency-stop",
            Event::AttentionRequest => "attention-request",
            Event::MaterialShortage => "material-shortage",
            Event::QualityIssue => "quality-issue",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// イベントの間引きと重複排除
///
/// 前回と違うイベントは min_interval 経過後に、同じイベントは repeat_interval 経過後に再送する。
/// イベントなしのフレームが来たら同じイベントでも新規扱いに戻す。
#[derive(Debug, Clone, PartialEq)]
pub struct EventGate {
    min_interval: f64,
    repeat_interval: f64,
    previous: Option<Event>,
    last_emit: Option<f64>,
}

impl EventGate {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            min_interval: config.min_interval,
            repeat_interval: config.repeat_interval,
            previous: None,
            last_emit: None,
        }
    }

    pub fn offer(&mut self, t: f64, candidate: Option<Event>) -> Option<Event> {
        let Some(event) = candidate else {
            self.previous = None;
            return None;
        };

        let elapsed = self.last_emit.map(|last| t - last);
        let interval = if self.previous == Some(event) {
            self.repeat_interval
        } else {
            self.min_interval
        };
        if elapsed.is_some_and(|e| e < interval) {
            return None;
        }

        self.previous = Some(event);
        self.last_emit = Some(t);
        info!(event = %event, t, "event emitted");
        Some(event)
    }
}
