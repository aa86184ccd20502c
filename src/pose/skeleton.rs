use super::keypoint::{KeypointIndex, Pose};

/// 親→子の骨と、身長に対する標準長さ比
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bone {
    pub parent: KeypointIndex,
    pub child: KeypointIndex,
    pub ratio: f32,
}

impl Bone {
    const fn new(parent: KeypointIndex, child: KeypointIndex, ratio: f32) -> Self {
        Self { parent, child, ratio }
    }
}

/// 固定の骨格グラフ（読み取り専用、全トラックで共有）
#[derive(Debug)]
pub struct SkeletonGraph {
    bones: &'static [Bone],
}

use KeypointIndex::*;

/// 根→葉の順（肩→肘 の後に 肘→手首）。近位の補正が同じパスで遠位に伝播する
const LIMB_BONES: [Bone; 8] = [
    Bone::new(LeftShoulder, LeftElbow, 0.16),
    Bone::new(RightShoulder, RightElbow, 0.16),
    Bone::new(LeftHip, LeftKnee, 0.23),
    Bone::new(RightHip, RightKnee, 0.23),
    Bone::new(LeftElbow, LeftWrist, 0.14),
    Bone::new(RightElbow, RightWrist, 0.14),
    Bone::new(LeftKnee, LeftAnkle, 0.20),
    Bone::new(RightKnee, RightAnkle, 0.20),
];

pub static SKELETON: SkeletonGraph = SkeletonGraph { bones: &LIMB_BONES };

/// 左右対称ペア (左, 右)
pub const SYMMETRIC_PAIRS: [(KeypointIndex, KeypointIndex); 6] = [
    (LeftShoulder, RightShoulder),
    (LeftElbow, RightElbow),
    (LeftWrist, RightWrist),
    (LeftHip, RightHip),
    (LeftKnee, RightKnee),
    (LeftAnkle, RightAnkle),
];

impl SkeletonGraph {
    pub fn bones(&self) -> &[Bone] {
        self.bones
    }

    /// ドミノ無効化: 親が無効なら子孫すべてを無効化
    pub fn cascade_invalidation(&self, pose: &mut Pose) {
        for bone in self.bones {
            if pose.get(bone.parent).confidence <= 0.0 {
                pose.get_mut(bone.child).invalidate();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    #[test]
    fn test_bones_are_root_to_leaf() {
        // 各骨の親は、それより前の骨の子であるか、グラフの根である
        let bones = SKELETON.bones();
        for (i, bone) in bones.iter().enumerate() {
            if let Some(pos) = bones.iter().position(|b| b.child == bone.parent) {
                assert!(pos < i, "{:?} processed before its parent bone", bone.child);
            }
        }
    }

    #[test]
    fn test_cascade_invalidates_whole_chain() {
        let mut pose = Pose::new([Keypoint::new(10.0, 10.0, 0.9); KeypointIndex::COUNT]);
        pose.get_mut(LeftShoulder).invalidate();
        SKELETON.cascade_invalidation(&mut pose);
        assert_eq!(pose.get(LeftElbow).confidence, 0.0);
        assert_eq!(pose.get(LeftWrist).confidence, 0.0);
        assert_eq!(pose.get(RightElbow).confidence, 0.9);
        assert_eq!(pose.get(LeftHip).confidence, 0.9);
    }

    #[test]
    fn test_cascade_from_mid_joint() {
        let mut pose = Pose::new([Keypoint::new(10.0, 10.0, 0.9); KeypointIndex::COUNT]);
        pose.get_mut(RightKnee).invalidate();
        SKELETON.cascade_invalidation(&mut pose);
        assert_eq!(pose.get(RightAnkle).confidence, 0.0);
        assert_eq!(pose.get(RightHip).confidence, 0.9);
    }
}
