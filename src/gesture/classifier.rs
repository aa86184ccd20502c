//! Instantaneous gesture classification from one filtered pose.
//!
//! Image coordinates: y grows downward, so the torso's "down" axis points
//! from the shoulder midpoint toward the hip midpoint.

use crate::config::{Config, GestureConfig};
use crate::pose::{Keypoint, KeypointIndex, Pose};

use super::labels::{ArmBand, GestureLabel, GestureSet, Posture};

const MIN_NORM: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// (肩, 肘, 手首)
    pub fn arm(self) -> (KeypointIndex, KeypointIndex, KeypointIndex) {
        use KeypointIndex::*;
        match self {
            Side::Left => (LeftShoulder, LeftElbow, LeftWrist),
            Side::Right => (RightShoulder, RightElbow, RightWrist),
        }
    }

    fn hip_knee(self) -> (KeypointIndex, KeypointIndex) {
        use KeypointIndex::*;
        match self {
            Side::Left => (LeftHip, LeftKnee),
            Side::Right => (RightHip, RightKnee),
        }
    }
}

/// 2ベクトルのなす角（度）。どちらかが長さ0なら None
fn angle_between(a: (f32, f32), b: (f32, f32)) -> Option<f32> {
    let na = (a.0 * a.0 + a.1 * a.1).sqrt();
    let nb = (b.0 * b.0 + b.1 * b.1).sqrt();
    if na < MIN_NORM || nb < MIN_NORM {
        return None;
    }
    let cos = ((a.0 * b.0 + a.1 * b.1) / (na * nb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

fn vector(from: &Keypoint, to: &Keypoint) -> (f32, f32) {
    (to.x - from.x, to.y - from.y)
}

/// 肘の内角。180° で腕がまっすぐ
pub fn elbow_angle(shoulder: &Keypoint, elbow: &Keypoint, wrist: &Keypoint) -> f32 {
    angle_between(vector(elbow, shoulder), vector(elbow, wrist)).unwrap_or(180.0)
}

/// 片腕の読み取り結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmReading {
    /// 体幹下向き軸と上腕のなす角（度）
    pub raise_angle: f32,
    pub elbow_angle: f32,
    pub band: ArmBand,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub posture: Option<Posture>,
    pub left: Option<ArmReading>,
    pub right: Option<ArmReading>,
    pub labels: GestureSet,
}

impl Observation {
    pub fn has_composite(&self) -> bool {
        self.labels.iter().any(|l| l.is_composite())
    }
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    config: GestureConfig,
}

impl GestureClassifier {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.gesture.clone(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    fn confident(&self, kp: &Keypoint) -> bool {
        kp.is_valid(self.config.min_joint_confidence)
    }

    fn torso(&self, pose: &Pose) -> Option<((f32, f32), (f32, f32))> {
        let t = self.config.min_joint_confidence;
        Some((pose.shoulder_center(t)?, pose.hip_center(t)?))
    }

    /// 体幹の下向き単位ベクトル。肩・腰が揃わなければ鉛直とみなす
    pub fn down_axis(&self, pose: &Pose) -> (f32, f32) {
        if let Some((s, h)) = self.torso(pose) {
            let v = (h.0 - s.0, h.1 - s.1);
            let n = (v.0 * v.0 + v.1 * v.1).sqrt();
            if n > MIN_NORM {
                return (v.0 / n, v.1 / n);
            }
        }
        (0.0, 1.0)
    }

    /// 背骨の傾きと股関節の角度から姿勢を判定（両肩・両腰が必要）
    pub fn posture(&self, pose: &Pose) -> Option<Posture> {
        let (s, h) = self.torso(pose)?;
        let spine = (s.0 - h.0, s.1 - h.1);
        let tilt = angle_between(spine, (0.0, -1.0))?;

        if tilt >= 70.0 {
            return Some(Posture::Lying);
        }
        if tilt >= 30.0 {
            return Some(Posture::Leaning);
        }

        // どちらかの脚が伸びていれば直立、そうでなく曲がっていれば座位
        let mut straight = false;
        let mut bent = false;
        for side in [Side::Left, Side::Right] {
            let (hip, knee) = side.hip_knee();
            let (hip, knee) = (pose.get(hip), pose.get(knee));
            if !(self.confident(hip) && self.confident(knee)) {
                continue;
            }
            let to_shoulders = (s.0 - hip.x, s.1 - hip.y);
            if let Some(a) = angle_between(to_shoulders, vector(hip, knee)) {
                straight |= a > 150.0;
                bent |= a < 120.0;
            }
        }
        if bent && !straight {
            Some(Posture::Sitting)
        } else {
            Some(Posture::Standing)
        }
    }

    /// 肩・肘・手首がすべて信頼できるときだけ読む
    pub fn arm(&self, pose: &Pose, side: Side, down: (f32, f32)) -> Option<ArmReading> {
        let (s, e, w) = side.arm();
        let (s, e, w) = (pose.get(s), pose.get(e), pose.get(w));
        if !(self.confident(s) && self.confident(e) && self.confident(w)) {
            return None;
        }
        let raise_angle = angle_between(down, vector(s, e))?;
        Some(ArmReading {
            raise_angle,
            elbow_angle: elbow_angle(s, e, w),
            band: ArmBand::from_angle(raise_angle),
        })
    }

    /// 両手首が鼻より上で、間隔が肩幅 × cross_max_separation 未満
    fn is_cross_above_head(&self, pose: &Pose) -> bool {
        let nose = pose.get(KeypointIndex::Nose);
        if !self.confident(nose) {
            return false;
        }
        let Some(width) = pose.shoulder_width(self.config.min_joint_confidence) else {
            return false;
        };
        let lw = pose.get(KeypointIndex::LeftWrist);
        let rw = pose.get(KeypointIndex::RightWrist);
        lw.y < nose.y && rw.y < nose.y && (lw.x - rw.x).abs() < self.config.cross_max_separation * width
    }

    pub fn classify(&self, pose: &Pose) -> Observation {
        let down = self.down_axis(pose);
        let posture = self.posture(pose);
        let left = self.arm(pose, Side::Left, down);
        let right = self.arm(pose, Side::Right, down);

        let mut labels = GestureSet::new();
        if let Some(p) = posture {
            labels.insert(p.into());
        }

        let composite = match (left, right) {
            (Some(l), Some(r)) => {
                if self.is_cross_above_head(pose) {
                    Some(GestureLabel::CrossAboveHead)
                } else if l.band.is_raised() && r.band.is_raised() {
                    Some(GestureLabel::BothArmsUp)
                } else if l.band == ArmBand::Side
                    && r.band == ArmBand::Side
                    && l.elbow_angle >= self.config.straight_elbow_angle
                    && r.elbow_angle >= self.config.straight_elbow_angle
                {
                    Some(GestureLabel::TPose)
                } else {
                    None
                }
            }
            _ => None,
        };

        match composite {
            Some(label) => {
                labels.insert(label);
            }
            None => {
                for (reading, up, out) in [
                    (left, GestureLabel::LeftArmUp, GestureLabel::LeftArmOut),
                    (right, GestureLabel::RightArmUp, GestureLabel::RightArmOut),
                ] {
                    match reading.map(|r| r.band) {
                        Some(band) if band.is_raised() => {
                            labels.insert(up);
                        }
                        Some(ArmBand::Side) => {
                            labels.insert(out);
                        }
                        _ => {}
                    }
                }
            }
        }

        Observation {
            posture,
            left,
            right,
            labels,
        }
    }

    /// 手振り用の標本: 手首が肘より上のとき (手首x − 肘x) / 肩幅
    pub fn wave_sample(&self, pose: &Pose, side: Side) -> Option<f32> {
        let (s, e, w) = side.arm();
        let (e, w) = (pose.get(e), pose.get(w));
        if !(self.confident(pose.get(s)) && self.confident(e) && self.confident(w)) {
            return None;
        }
        let width = pose.shoulder_width(self.config.min_joint_confidence)?;
        if width < MIN_NORM || w.y >= e.y {
            return None;
        }
        Some((w.x - e.x) / width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::fixtures::{cross_above_head_pose, standing_pose};
    use KeypointIndex::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::from_config(&Config::default())
    }

    fn labels(pose: &Pose) -> Vec<GestureLabel> {
        classifier().classify(pose).labels.into_iter().collect()
    }

    fn set(pose: &mut Pose, joint: KeypointIndex, x: f32, y: f32) {
        *pose.get_mut(joint) = Keypoint::new(x, y, 0.9);
    }

    #[test]
    fn test_elbow_angle() {
        let s = Keypoint::new(0.0, 0.0, 1.0);
        let e = Keypoint::new(10.0, 0.0, 1.0);
        assert!((elbow_angle(&s, &e, &Keypoint::new(20.0, 0.0, 1.0)) - 180.0).abs() < 0.1);
        assert!((elbow_angle(&s, &e, &Keypoint::new(10.0, 10.0, 1.0)) - 90.0).abs() < 0.1);
        // 長さ0はまっすぐ扱い
        assert_eq!(elbow_angle(&s, &s, &e), 180.0);
    }

    #[test]
    fn test_standing_arms_down() {
        let c = classifier();
        let obs = c.classify(&standing_pose(0.9));
        assert_eq!(obs.posture, Some(Posture::Standing));
        assert_eq!(obs.left.map(|r| r.band), Some(ArmBand::Down));
        assert_eq!(obs.labels.into_iter().collect::<Vec<_>>(), vec![GestureLabel::Standing]);
    }

    #[test]
    fn test_cross_above_head_overrides_single_arm_labels() {
        assert_eq!(
            labels(&cross_above_head_pose(0.9)),
            vec![GestureLabel::Standing, GestureLabel::CrossAboveHead]
        );
    }

    #[test]
    fn test_cross_requires_confident_nose() {
        let mut pose = cross_above_head_pose(0.9);
        pose.get_mut(Nose).confidence = 0.1;
        assert_eq!(
            labels(&pose),
            vec![GestureLabel::Standing, GestureLabel::BothArmsUp]
        );
    }

    #[test]
    fn test_both_arms_up() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftElbow, 142.0, 112.0);
        set(&mut pose, LeftWrist, 143.0, 92.0);
        set(&mut pose, RightElbow, 108.0, 112.0);
        set(&mut pose, RightWrist, 107.0, 92.0);
        assert_eq!(
            labels(&pose),
            vec![GestureLabel::Standing, GestureLabel::BothArmsUp]
        );
    }

    #[test]
    fn test_t_pose() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftElbow, 161.0, 135.0);
        set(&mut pose, LeftWrist, 181.0, 135.0);
        set(&mut pose, RightElbow, 89.0, 135.0);
        set(&mut pose, RightWrist, 69.0, 135.0);
        assert_eq!(labels(&pose), vec![GestureLabel::Standing, GestureLabel::TPose]);
    }

    #[test]
    fn test_bent_arms_out_are_not_t_pose() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftElbow, 161.0, 135.0);
        set(&mut pose, LeftWrist, 161.0, 115.0);
        set(&mut pose, RightElbow, 89.0, 135.0);
        set(&mut pose, RightWrist, 89.0, 115.0);
        assert_eq!(
            labels(&pose),
            vec![
                GestureLabel::Standing,
                GestureLabel::LeftArmOut,
                GestureLabel::RightArmOut
            ]
        );
    }

    #[test]
    fn test_single_arm_up() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, RightElbow, 108.0, 112.0);
        set(&mut pose, RightWrist, 107.0, 92.0);
        assert_eq!(
            labels(&pose),
            vec![GestureLabel::Standing, GestureLabel::RightArmUp]
        );
    }

    #[test]
    fn test_partial_arm_is_not_classified() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, RightElbow, 108.0, 112.0);
        *pose.get_mut(RightWrist) = Keypoint::new(107.0, 92.0, 0.1);
        let obs = classifier().classify(&pose);
        assert_eq!(obs.right, None);
        assert_eq!(obs.labels.into_iter().collect::<Vec<_>>(), vec![GestureLabel::Standing]);
    }

    #[test]
    fn test_sitting() {
        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftKnee, 165.0, 182.0);
        set(&mut pose, RightKnee, 145.0, 182.0);
        assert_eq!(classifier().posture(&pose), Some(Posture::Sitting));
    }

    #[test]
    fn test_one_straight_leg_is_standing() {
        // 左脚は伸び、右腿は前に上がっている（平均すると座位の角度）
        let mut pose = standing_pose(0.9);
        set(&mut pose, RightKnee, 130.0, 170.0);
        assert_eq!(classifier().posture(&pose), Some(Posture::Standing));
    }

    #[test]
    fn test_leaning_and_lying() {
        let c = classifier();
        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftShoulder, 108.0, 150.0);
        set(&mut pose, RightShoulder, 82.0, 150.0);
        assert_eq!(c.posture(&pose), Some(Posture::Leaning));

        let mut lying = standing_pose(0.9);
        set(&mut lying, LeftShoulder, 100.0, 180.0);
        set(&mut lying, RightShoulder, 100.0, 154.0);
        set(&mut lying, LeftHip, 150.0, 180.0);
        set(&mut lying, RightHip, 150.0, 154.0);
        assert_eq!(c.posture(&lying), Some(Posture::Lying));
    }

    #[test]
    fn test_missing_hips_assumes_upright_spine() {
        let c = classifier();
        let mut pose = standing_pose(0.9);
        pose.get_mut(LeftHip).invalidate();
        pose.get_mut(RightHip).invalidate();
        set(&mut pose, RightElbow, 108.0, 112.0);
        set(&mut pose, RightWrist, 107.0, 92.0);
        assert_eq!(c.down_axis(&pose), (0.0, 1.0));
        assert_eq!(labels(&pose), vec![GestureLabel::RightArmUp]);
    }

    #[test]
    fn test_wave_sample_requires_raised_wrist() {
        let c = classifier();
        assert_eq!(c.wave_sample(&standing_pose(0.9), Side::Left), None);

        let mut pose = standing_pose(0.9);
        set(&mut pose, LeftElbow, 148.0, 125.0);
        set(&mut pose, LeftWrist, 156.0, 105.0);
        let sample = c.wave_sample(&pose, Side::Left).unwrap();
        assert!((sample - 8.0 / 26.0).abs() < 1e-4);
    }
}
