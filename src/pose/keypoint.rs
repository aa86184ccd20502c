use serde::Serialize;

/// COCO 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

/// 関節の種類（ボックス外マージンとフィルタ設定の切り替えに使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointClass {
    /// 頭・肩・腰
    Core,
    /// 肘・膝
    Mid,
    /// 手首・足首
    Extremity,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; KeypointIndex::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn class(self) -> JointClass {
        use KeypointIndex::*;
        match self {
            LeftElbow | RightElbow | LeftKnee | RightKnee => JointClass::Mid,
            LeftWrist | RightWrist | LeftAnkle | RightAnkle => JointClass::Extremity,
            _ => JointClass::Core,
        }
    }

    /// 頭部（鼻・目・耳）
    pub fn is_head(self) -> bool {
        (self as usize) <= KeypointIndex::RightEar as usize
    }
}

/// 単一キーポイント（画像ピクセル座標、原点左上、y下向き）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// 信頼度 (0.0〜1.0)。0 は「無効な関節」を表す
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か（0 は常に無効）
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence > 0.0 && self.confidence >= threshold
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn distance_to(&self, other: &Keypoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn invalidate(&mut self) {
        self.confidence = 0.0;
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// 17キーポイントからなる姿勢
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn get_mut(&mut self, index: KeypointIndex) -> &mut Keypoint {
        &mut self.keypoints[index as usize]
    }

    pub fn valid_count(&self, threshold: f32) -> usize {
        self.keypoints.iter().filter(|k| k.is_valid(threshold)).count()
    }

    /// 閾値以上のキーポイントの重心
    pub fn centroid(&self, threshold: f32) -> Option<(f32, f32)> {
        let (sx, sy, n) = self
            .keypoints
            .iter()
            .filter(|k| k.is_valid(threshold))
            .fold((0.0, 0.0, 0usize), |(sx, sy, n), k| (sx + k.x, sy + k.y, n + 1));
        if n == 0 {
            None
        } else {
            Some((sx / n as f32, sy / n as f32))
        }
    }

    /// 左右ペアの中点（両方有効な場合のみ）
    pub fn midpoint(&self, a: KeypointIndex, b: KeypointIndex, threshold: f32) -> Option<(f32, f32)> {
        let ka = self.get(a);
        let kb = self.get(b);
        if ka.is_valid(threshold) && kb.is_valid(threshold) {
            Some(((ka.x + kb.x) / 2.0, (ka.y + kb.y) / 2.0))
        } else {
            None
        }
    }

    pub fn shoulder_center(&self, threshold: f32) -> Option<(f32, f32)> {
        self.midpoint(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, threshold)
    }

    pub fn hip_center(&self, threshold: f32) -> Option<(f32, f32)> {
        self.midpoint(KeypointIndex::LeftHip, KeypointIndex::RightHip, threshold)
    }

    /// 肩幅（両肩が有効な場合のみ）
    pub fn shoulder_width(&self, threshold: f32) -> Option<f32> {
        let l = self.get(KeypointIndex::LeftShoulder);
        let r = self.get(KeypointIndex::RightShoulder);
        if l.is_valid(threshold) && r.is_valid(threshold) {
            Some(l.distance_to(r))
        } else {
            None
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}
