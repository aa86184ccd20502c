use crate::config::{AnatomyConfig, Config};
use crate::pose::{BBox, KeypointIndex, Pose};

/// 骨格を棄却した理由
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    TooFewJoints { count: usize },
    NoCoreJoint,
    CentroidOffset { distance: f32, limit: f32 },
    /// 立ち姿勢のボックスで肩が腰より下にある
    Inverted,
}

fn mean_y(pose: &Pose, joints: [KeypointIndex; 2], threshold: f32) -> Option<f32> {
    let (sum, n) = joints
        .iter()
        .map(|&j| pose.get(j))
        .filter(|k| k.is_valid(threshold))
        .fold((0.0, 0usize), |(s, n), k| (s + k.y, n + 1));
    (n > 0).then(|| sum / n as f32)
}

pub(crate) fn shoulder_y(pose: &Pose, threshold: f32) -> Option<f32> {
    mean_y(pose, [KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder], threshold)
}

pub(crate) fn hip_y(pose: &Pose, threshold: f32) -> Option<f32> {
    mean_y(pose, [KeypointIndex::LeftHip, KeypointIndex::RightHip], threshold)
}

/// 骨格全体の妥当性チェック（ゴースト除去）
#[derive(Debug, Clone)]
pub struct AnatomyValidator {
    config: AnatomyConfig,
    keypoint_confidence: f32,
}

impl AnatomyValidator {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.anatomy.clone(),
            keypoint_confidence: config.detection.keypoint_confidence,
        }
    }

    pub fn validate(&self, pose: &Pose, bbox: &BBox) -> bool {
        self.check(pose, bbox).is_none()
    }

    /// 最初に見つかった棄却理由。妥当なら None
    pub fn check(&self, pose: &Pose, bbox: &BBox) -> Option<Rejection> {
        let t = self.keypoint_confidence;

        let count = pose.valid_count(t);
        if count < self.config.min_valid_keypoints {
            return Some(Rejection::TooFewJoints { count });
        }

        let shoulder = shoulder_y(pose, t);
        let hip = hip_y(pose, t);
        if self.config.require_core_joint && shoulder.is_none() && hip.is_none() {
            return Some(Rejection::NoCoreJoint);
        }

        if let Some((cx, cy)) = pose.centroid(t) {
            let (bx, by) = bbox.center();
            let distance = ((cx - bx).powi(2) + (cy - by).powi(2)).sqrt();
            let limit = bbox.diagonal() * self.config.max_centroid_offset;
            if distance > limit {
                return Some(Rejection::CentroidOffset { distance, limit });
            }
        }

        if bbox.h > bbox.w * self.config.upright_aspect {
            if let (Some(s), Some(h)) = (shoulder, hip) {
                if s > h + self.config.vertical_slack {
                    return Some(Rejection::Inverted);
                }
            }
        }

        None
    }
}
