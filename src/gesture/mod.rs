pub mod classifier;
pub mod labels;
pub mod vote;
pub mod wave;

pub use classifier::{ArmReading, GestureClassifier, Observation, Side};
pub use labels::{ArmBand, GestureLabel, GestureSet, Posture};
pub use vote::VoteBuffer;
pub use wave::WaveDetector;

use crate::config::GestureConfig;
use crate::pose::Pose;

/// トラック1つ分のジェスチャ状態（手振り履歴と多数決バッファ）
#[derive(Debug, Clone, PartialEq)]
pub struct GestureTracker {
    wave_left: WaveDetector,
    wave_right: WaveDetector,
    votes: VoteBuffer,
}

impl GestureTracker {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            wave_left: WaveDetector::new(config),
            wave_right: WaveDetector::new(config),
            votes: VoteBuffer::new(config.vote_buffer_size, config.acceptance_fraction),
        }
    }

    /// そのフレームの瞬時ラベル（手振りを含む）。pose が None なら空
    pub fn instantaneous(&mut self, classifier: &GestureClassifier, pose: Option<&Pose>) -> GestureSet {
        let Some(pose) = pose else {
            self.wave_left.reset();
            self.wave_right.reset();
            return GestureSet::new();
        };

        let observation = classifier.classify(pose);
        let left = self.wave_left.update(classifier.wave_sample(pose, Side::Left));
        let right = self.wave_right.update(classifier.wave_sample(pose, Side::Right));

        let mut labels = observation.labels.clone();
        if !observation.has_composite() {
            if left {
                labels.insert(GestureLabel::WaveLeft);
            }
            if right {
                labels.insert(GestureLabel::WaveRight);
            }
        }
        labels
    }

    /// 瞬時ラベルを投票して安定化したラベルを返す
    pub fn observe(&mut self, classifier: &GestureClassifier, pose: Option<&Pose>) -> GestureSet {
        let labels = self.instantaneous(classifier, pose);
        self.votes.push(labels);
        self.votes.stable()
    }
}
