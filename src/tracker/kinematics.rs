use crate::config::{Config, KinematicsConfig};
use crate::pose::{BBox, Pose, SKELETON};

const MIN_LENGTH: f32 = 1e-3;

/// 胴長（肩中点〜腰中点）× 係数。両肩・両腰が揃わなければボックス高さ
pub fn reference_height(pose: &Pose, bbox: &BBox, threshold: f32, torso_to_height: f32) -> f32 {
    if let (Some(s), Some(h)) = (pose.shoulder_center(threshold), pose.hip_center(threshold)) {
        let torso = ((s.0 - h.0).powi(2) + (s.1 - h.1).powi(2)).sqrt();
        if torso > MIN_LENGTH {
            return torso * torso_to_height;
        }
    }
    bbox.h
}

/// 骨長比による関節補正
///
/// 骨を根→葉の順に見て、許容帯の外なら子関節を骨方向に沿って帯の端まで動かす。
/// 上限 × deletion_multiplier を超える場合は子を無効化する。
/// 親が無効なら子も無効（ドミノ）。
#[derive(Debug, Clone)]
pub struct KinematicSolver {
    config: KinematicsConfig,
    keypoint_confidence: f32,
}

impl KinematicSolver {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.kinematics.clone(),
            keypoint_confidence: config.detection.keypoint_confidence,
        }
    }

    pub fn reference_height(&self, pose: &Pose, bbox: &BBox) -> f32 {
        reference_height(pose, bbox, self.keypoint_confidence, self.config.torso_to_height)
    }

    pub fn apply(&self, pose: &Pose, reference_height: f32) -> Pose {
        let mut out = pose.clone();
        let usable_height = reference_height.is_finite() && reference_height > MIN_LENGTH;

        for bone in SKELETON.bones() {
            let parent = *out.get(bone.parent);
            if parent.confidence <= 0.0 {
                out.get_mut(bone.child).invalidate();
                continue;
            }
            let child = out.get_mut(bone.child);
            if child.confidence <= 0.0 || !usable_height {
                continue;
            }

            let dx = child.x - parent.x;
            let dy = child.y - parent.y;
            let length = (dx * dx + dy * dy).sqrt();
            if length < MIN_LENGTH {
                continue;
            }

            let expected = reference_height * bone.ratio;
            let min = expected * (1.0 - self.config.tolerance);
            let max = expected * (1.0 + self.config.tolerance);

            if length > max * self.config.deletion_multiplier {
                child.invalidate();
            } else if length < min || length > max {
                let target = length.clamp(min, max);
                child.x = parent.x + dx / length * target;
                child.y = parent.y + dy / length * target;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::fixtures::{standing_box, standing_pose};
    use crate::pose::{Keypoint, KeypointIndex::*};

    fn solver() -> KinematicSolver {
        KinematicSolver::from_config(&Config::default())
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn test_reference_height_from_torso() {
        let pose = standing_pose(0.9);
        // 胴長 45 × 3.4
        assert!(approx_eq(solver().reference_height(&pose, &standing_box()), 153.0));
    }

    #[test]
    fn test_reference_height_falls_back_to_box() {
        let mut pose = standing_pose(0.9);
        pose.get_mut(RightHip).invalidate();
        assert_eq!(solver().reference_height(&pose, &standing_box()), 150.0);
    }

    #[test]
    fn test_plausible_pose_is_unchanged() {
        let s = solver();
        let pose = standing_pose(0.9);
        let h = s.reference_height(&pose, &standing_box());
        assert_eq!(s.apply(&pose, h), pose);
    }

    #[test]
    fn test_long_forearm_is_rescaled_along_bone() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(LeftWrist) = Keypoint::new(141.0, 200.0, 0.9);
        let out = s.apply(&pose, 153.0);

        let elbow = out.get(LeftElbow);
        let wrist = out.get(LeftWrist);
        // 上限 = 153 × 0.14 × 1.3
        assert!(approx_eq(elbow.distance_to(wrist), 27.846));
        assert_eq!(wrist.confidence, 0.9);
        // 方向は保たれる
        let before = ((141.0f32 - 140.0) / (200.0f32 - 158.0)).atan();
        let after = ((wrist.x - elbow.x) / (wrist.y - elbow.y)).atan();
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn test_short_forearm_is_extended() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(LeftWrist) = Keypoint::new(140.0, 163.0, 0.9);
        let out = s.apply(&pose, 153.0);
        // 下限 = 153 × 0.14 × 0.7
        assert!(approx_eq(out.get(LeftElbow).distance_to(out.get(LeftWrist)), 14.994));
    }

    #[test]
    fn test_leash_cut() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(RightWrist) = Keypoint::new(109.0, 300.0, 0.9);
        let out = s.apply(&pose, 153.0);
        assert_eq!(out.get(RightWrist).confidence, 0.0);
        assert_eq!(out.get(RightElbow).confidence, 0.9);
    }

    #[test]
    fn test_upper_arm_cut_cascades_to_wrist() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(LeftElbow) = Keypoint::new(140.0, 400.0, 0.9);
        let out = s.apply(&pose, 153.0);
        assert_eq!(out.get(LeftElbow).confidence, 0.0);
        assert_eq!(out.get(LeftWrist).confidence, 0.0);
    }

    #[test]
    fn test_invalid_root_invalidates_chain() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        pose.get_mut(LeftHip).invalidate();
        let out = s.apply(&pose, 153.0);
        assert_eq!(out.get(LeftKnee).confidence, 0.0);
        assert_eq!(out.get(LeftAnkle).confidence, 0.0);
        assert_eq!(out.get(RightAnkle).confidence, 0.9);
    }

    #[test]
    fn test_rescaled_elbow_moves_before_wrist_check() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        // 肘を遠くに置くと上腕が縮められ、前腕はその新しい肘位置で評価される
        *pose.get_mut(LeftElbow) = Keypoint::new(140.0, 175.0, 0.9);
        *pose.get_mut(LeftWrist) = Keypoint::new(141.0, 195.0, 0.9);
        let out = s.apply(&pose, 153.0);
        let upper = out.get(LeftShoulder).distance_to(out.get(LeftElbow));
        assert!(approx_eq(upper, 153.0 * 0.16 * 1.3));
        assert_eq!(out.get(LeftWrist).confidence, 0.9);
    }

    #[test]
    fn test_coincident_joints_are_left_alone() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(LeftElbow) = *pose.get(LeftShoulder);
        let out = s.apply(&pose, 153.0);
        assert_eq!(out.get(LeftElbow), pose.get(LeftElbow));
    }

    #[test]
    fn test_degenerate_height_only_cascades() {
        let s = solver();
        let mut pose = standing_pose(0.9);
        *pose.get_mut(LeftWrist) = Keypoint::new(141.0, 900.0, 0.9);
        pose.get_mut(RightShoulder).invalidate();
        let out = s.apply(&pose, 0.0);
        assert_eq!(out.get(LeftWrist).confidence, 0.9);
        assert_eq!(out.get(RightElbow).confidence, 0.0);
    }
}
