pub mod detection;
pub mod keypoint;
pub mod skeleton;

pub use detection::{BBox, DetectionRecord, IngestError, KeypointEncoding, RawDetection};
pub use keypoint::{JointClass, Keypoint, KeypointIndex, Pose};
pub use skeleton::{Bone, SkeletonGraph, SKELETON, SYMMETRIC_PAIRS};

/// テスト用の姿勢データ
#[cfg(test)]
pub(crate) mod fixtures {
    use super::{BBox, Keypoint, KeypointIndex, Pose, RawDetection};
    use KeypointIndex::*;

    /// (100,100,50,150) のボックスに収まる直立姿勢
    pub fn standing_pose(confidence: f32) -> Pose {
        let mut pose = Pose::default();
        let points: [(KeypointIndex, f32, f32); 17] = [
            (Nose, 125.0, 112.0),
            (LeftEye, 128.0, 109.0),
            (RightEye, 122.0, 109.0),
            (LeftEar, 131.0, 111.0),
            (RightEar, 119.0, 111.0),
            (LeftShoulder, 138.0, 135.0),
            (RightShoulder, 112.0, 135.0),
            (LeftElbow, 140.0, 158.0),
            (RightElbow, 110.0, 158.0),
            (LeftWrist, 141.0, 178.0),
            (RightWrist, 109.0, 178.0),
            (LeftHip, 135.0, 180.0),
            (RightHip, 115.0, 180.0),
            (LeftKnee, 135.0, 215.0),
            (RightKnee, 115.0, 215.0),
            (LeftAnkle, 135.0, 243.0),
            (RightAnkle, 115.0, 243.0),
        ];
        for (idx, x, y) in points {
            *pose.get_mut(idx) = Keypoint::new(x, y, confidence);
        }
        pose
    }

    /// 両手首を鼻より上で交差させた姿勢
    pub fn cross_above_head_pose(confidence: f32) -> Pose {
        let mut pose = standing_pose(confidence);
        *pose.get_mut(LeftElbow) = Keypoint::new(145.0, 115.0, confidence);
        *pose.get_mut(RightElbow) = Keypoint::new(105.0, 115.0, confidence);
        *pose.get_mut(LeftWrist) = Keypoint::new(124.0, 101.0, confidence);
        *pose.get_mut(RightWrist) = Keypoint::new(126.0, 101.0, confidence);
        pose
    }

    pub fn standing_box() -> BBox {
        BBox::new(100.0, 100.0, 50.0, 150.0)
    }

    pub fn translated(pose: &Pose, dx: f32, dy: f32) -> Pose {
        let mut out = pose.clone();
        for kp in out.keypoints.iter_mut() {
            kp.x += dx;
            kp.y += dy;
        }
        out
    }

    pub fn standing_detection(dx: f32, dy: f32) -> RawDetection {
        let b = standing_box();
        RawDetection::new(
            BBox::new(b.x + dx, b.y + dy, b.w, b.h),
            0.9,
            translated(&standing_pose(0.9), dx, dy),
        )
    }
}
