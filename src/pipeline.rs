//! Per-frame pipeline: association, smoothing, kinematic correction,
//! validation, quality scoring, gesture debouncing and events.

use serde::Serialize;
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::events::{Event, EventGate};
use crate::gesture::{GestureClassifier, GestureSet, GestureTracker};
use crate::pose::{Keypoint, Pose, RawDetection, SKELETON};
use crate::tracker::{
    AnatomyValidator, IdentityTracker, KinematicSolver, QualityGrade, QualityReport, QualityScorer, TrackId,
};

/// 出力レコード（見えているトラック1つ分）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedObject {
    pub id: TrackId,
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub score: f32,
    pub quality_score: f32,
    pub grade: QualityGrade,
    /// 検証に落ちたフレームでは空
    pub keypoints: Vec<Keypoint>,
    pub gestures: GestureSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput {
    pub timestamp: f64,
    pub objects: Vec<TrackedObject>,
    pub event: Option<Event>,
}

/// トラックごとにパイプラインが持つ状態
#[derive(Debug, Clone, Default)]
pub struct IdentityState {
    previous: Option<Pose>,
    gestures: Option<GestureTracker>,
    latest: Option<TrackedObject>,
}

pub struct Pipeline {
    tracker: IdentityTracker<IdentityState>,
    solver: KinematicSolver,
    validator: AnatomyValidator,
    scorer: QualityScorer,
    classifier: GestureClassifier,
    gate: EventGate,
    last: FrameOutput,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracker: IdentityTracker::from_config(&config),
            solver: KinematicSolver::from_config(&config),
            validator: AnatomyValidator::from_config(&config),
            scorer: QualityScorer::from_config(&config),
            classifier: GestureClassifier::from_config(&config),
            gate: EventGate::new(&config.events),
            last: FrameOutput {
                timestamp: 0.0,
                objects: Vec::new(),
                event: None,
            },
        })
    }

    pub fn tracker(&self) -> &IdentityTracker<IdentityState> {
        &self.tracker
    }

    /// 検出結果1フレーム分を処理
    pub fn update(&mut self, t: f64, detections: &[RawDetection]) -> FrameOutput {
        for (handle, index) in self.tracker.update(t, detections) {
            let Some(filtered) = self.tracker.filter_keypoints(handle, t, &detections[index].pose) else {
                continue;
            };
            let Some(track) = self.tracker.get(handle) else {
                continue;
            };
            let (id, bbox, score) = (track.id(), *track.bbox(), track.score());

            let height = self.solver.reference_height(&filtered, &bbox);
            let mut pose = self.solver.apply(&filtered, height);
            self.tracker.geometry().enforce_bounds(&mut pose, &bbox);
            SKELETON.cascade_invalidation(&mut pose);

            let Some(track) = self.tracker.get_mut(handle) else {
                continue;
            };
            let state = &mut track.state;
            let gestures = state
                .gestures
                .get_or_insert_with(|| GestureTracker::new(self.classifier.config()));

            let valid = match self.validator.check(&pose, &bbox) {
                None => true,
                Some(reason) => {
                    debug!(id, ?reason, "skeleton rejected");
                    false
                }
            };

            let (quality, keypoints, stable) = if valid {
                let quality = self.scorer.score(&pose, &bbox, state.previous.as_ref());
                let stable = gestures.observe(&self.classifier, Some(&pose));
                let keypoints = pose.keypoints.to_vec();
                state.previous = Some(pose);
                (quality, keypoints, stable)
            } else {
                let stable = gestures.observe(&self.classifier, None);
                state.previous = None;
                (QualityReport::invalid(), Vec::new(), stable)
            };

            state.latest = Some(TrackedObject {
                id,
                bbox: bbox.to_array(),
                score,
                quality_score: quality.score,
                grade: quality.grade,
                keypoints,
                gestures: stable,
            });
        }

        let objects: Vec<TrackedObject> = self
            .tracker
            .tracks()
            .filter(|t| t.is_visible())
            .filter_map(|t| t.state.latest.clone())
            .collect();

        let candidate = best_object(&objects).and_then(|o| Event::from_gestures(&o.gestures));
        let event = self.gate.offer(t, candidate);

        self.last = FrameOutput {
            timestamp: t,
            objects,
            event,
        };
        self.last.clone()
    }

    /// 検出をスキップしたフレーム。直前の出力をそのまま返す（イベントなし）
    pub fn predict(&self, t: f64) -> FrameOutput {
        FrameOutput {
            timestamp: t,
            objects: self.last.objects.clone(),
            event: None,
        }
    }
}

/// 品質最大（同点なら ID 最小）のオブジェクト
fn best_object(objects: &[TrackedObject]) -> Option<&TrackedObject> {
    objects.iter().fold(None, |best, o| match best {
        Some(b) if b.quality_score >= o.quality_score => Some(b),
        _ => Some(o),
    })
}
