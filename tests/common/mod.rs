#![allow(dead_code)]

use posewatch::pose::{BBox, Keypoint, KeypointIndex, Pose, RawDetection};
use KeypointIndex::*;

pub const FPS: f64 = 30.0;

pub fn frame_time(i: usize) -> f64 {
    i as f64 / FPS
}

/// (100,100,50,150) のボックスに収まる直立姿勢を (dx, dy) だけずらしたもの
pub fn standing_pose(dx: f32, dy: f32, confidence: f32) -> Pose {
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
    let mut pose = Pose::default();
    for (idx, x, y) in points {
        *pose.get_mut(idx) = Keypoint::new(x + dx, y + dy, confidence);
    }
    pose
}

/// 両手首を鼻より上で近づけた姿勢
pub fn cross_pose(dx: f32, dy: f32, confidence: f32) -> Pose {
    let mut pose = standing_pose(dx, dy, confidence);
    *pose.get_mut(LeftElbow) = Keypoint::new(145.0 + dx, 115.0 + dy, confidence);
    *pose.get_mut(RightElbow) = Keypoint::new(105.0 + dx, 115.0 + dy, confidence);
    *pose.get_mut(LeftWrist) = Keypoint::new(124.0 + dx, 101.0 + dy, confidence);
    *pose.get_mut(RightWrist) = Keypoint::new(126.0 + dx, 101.0 + dy, confidence);
    pose
}

pub fn detection(dx: f32, dy: f32, pose: Pose) -> RawDetection {
    RawDetection::new(BBox::new(100.0 + dx, 100.0 + dy, 50.0, 150.0), 0.9, pose)
}

pub fn standing(dx: f32, dy: f32) -> RawDetection {
    detection(dx, dy, standing_pose(dx, dy, 0.9))
}

pub fn crossing(dx: f32, dy: f32) -> RawDetection {
    detection(dx, dy, cross_pose(dx, dy, 0.9))
}
