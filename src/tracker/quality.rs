use serde::Serialize;

use crate::config::{Config, QualityConfig};
use crate::pose::{BBox, KeypointIndex, Pose, SKELETON, SYMMETRIC_PAIRS};

use super::anatomy::{hip_y, shoulder_y};
use super::kinematics::reference_height;

/// 該当項目がない副スコアの値
const NEUTRAL: f32 = 0.5;

/// 表示・デバッグ用の品質区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    Invalid,
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityReport {
    pub score: f32,
    pub structural: f32,
    pub symmetry: f32,
    pub kinematic: f32,
    pub temporal: f32,
    pub coverage: f32,
    pub grade: QualityGrade,
}

impl QualityReport {
    /// 検証に落ちた骨格
    pub fn invalid() -> Self {
        Self {
            score: 0.0,
            structural: 0.0,
            symmetry: 0.0,
            kinematic: 0.0,
            temporal: 0.0,
            coverage: 0.0,
            grade: QualityGrade::Invalid,
        }
    }
}

fn mean_or_neutral(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        NEUTRAL
    } else {
        sum / n as f32
    }
}

/// 5つの副スコアの重み付き和で骨格の品質を評価
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
    tolerance: f32,
    torso_to_height: f32,
    keypoint_confidence: f32,
}

impl QualityScorer {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.quality.clone(),
            tolerance: config.kinematics.tolerance,
            torso_to_height: config.kinematics.torso_to_height,
            keypoint_confidence: config.detection.keypoint_confidence,
        }
    }

    pub fn grade(&self, score: f32) -> QualityGrade {
        let q = &self.config;
        if score >= q.excellent {
            QualityGrade::Excellent
        } else if score >= q.good {
            QualityGrade::Good
        } else if score >= q.fair {
            QualityGrade::Fair
        } else if score >= q.poor {
            QualityGrade::Poor
        } else {
            QualityGrade::Invalid
        }
    }

    pub fn score(&self, pose: &Pose, bbox: &BBox, previous: Option<&Pose>) -> QualityReport {
        let height = reference_height(pose, bbox, self.keypoint_confidence, self.torso_to_height).max(1.0);

        let structural = self.structural(pose, bbox, height);
        let symmetry = self.symmetry(pose, height);
        let kinematic = self.kinematic(pose, height);
        let temporal = self.temporal(pose, previous, height);
        let coverage = pose.valid_count(self.keypoint_confidence) as f32 / KeypointIndex::COUNT as f32;

        let q = &self.config;
        let weighted = [
            (q.structural_weight, structural),
            (q.symmetry_weight, symmetry),
            (q.kinematic_weight, kinematic),
            (q.temporal_weight, temporal),
            (q.coverage_weight, coverage),
        ];
        let total: f32 = weighted.iter().map(|(w, _)| w).sum();
        let score = if total > 0.0 {
            (weighted.iter().map(|(w, s)| w * s).sum::<f32>() / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        QualityReport {
            score,
            structural,
            symmetry,
            kinematic,
            temporal,
            coverage,
            grade: self.grade(score),
        }
    }

    /// 頭が肩より上・腰が肩より下・重心がボックス内・外れ値なし
    fn structural(&self, pose: &Pose, bbox: &BBox, height: f32) -> f32 {
        let t = self.keypoint_confidence;
        let shoulder = shoulder_y(pose, t);
        let mut checks: Vec<bool> = Vec::with_capacity(4);

        let nose = pose.get(KeypointIndex::Nose);
        if let (true, Some(s)) = (nose.is_valid(t), shoulder) {
            checks.push(nose.y < s);
        }
        if let (Some(s), Some(h)) = (shoulder, hip_y(pose, t)) {
            checks.push(h > s);
        }
        if let Some((cx, cy)) = pose.centroid(t) {
            checks.push(bbox.contains_with_margin(cx, cy, 0.0));
            let limit = self.config.outlier_distance * height;
            checks.push(
                pose.keypoints
                    .iter()
                    .filter(|k| k.is_valid(t))
                    .all(|k| ((k.x - cx).powi(2) + (k.y - cy).powi(2)).sqrt() <= limit),
            );
        }

        if checks.is_empty() {
            NEUTRAL
        } else {
            checks.iter().filter(|&&ok| ok).count() as f32 / checks.len() as f32
        }
    }

    fn symmetry(&self, pose: &Pose, height: f32) -> f32 {
        let t = self.keypoint_confidence;
        let limit = self.config.symmetry_limit * height;
        mean_or_neutral(SYMMETRIC_PAIRS.iter().filter_map(|&(l, r)| {
            let (kl, kr) = (pose.get(l), pose.get(r));
            (kl.is_valid(t) && kr.is_valid(t)).then(|| (1.0 - (kl.y - kr.y).abs() / limit).clamp(0.0, 1.0))
        }))
    }

    fn kinematic(&self, pose: &Pose, height: f32) -> f32 {
        let t = self.keypoint_confidence;
        let band = 2.0 * self.tolerance.max(f32::EPSILON);
        mean_or_neutral(SKELETON.bones().iter().filter_map(|bone| {
            let (p, c) = (pose.get(bone.parent), pose.get(bone.child));
            if !(p.is_valid(t) && c.is_valid(t)) {
                return None;
            }
            let expected = bone.ratio * height;
            let deviation = (p.distance_to(c) / expected - 1.0).abs();
            Some((1.0 - deviation / band).clamp(0.0, 1.0))
        }))
    }

    /// 前フレームからの平均移動量（体格比）が小さいほど1
    fn temporal(&self, pose: &Pose, previous: Option<&Pose>, height: f32) -> f32 {
        let t = self.keypoint_confidence;
        let Some(previous) = previous else {
            return self.config.neutral_temporal;
        };
        let (sum, n) = pose
            .keypoints
            .iter()
            .zip(previous.keypoints.iter())
            .filter(|(a, b)| a.is_valid(t) && b.is_valid(t))
            .fold((0.0, 0usize), |(s, n), (a, b)| (s + a.distance_to(b), n + 1));
        if n == 0 {
            return self.config.neutral_temporal;
        }
        let displacement = sum / n as f32 / height;
        (1.0 - displacement / self.config.displacement_limit).clamp(0.0, 1.0)
    }
}
