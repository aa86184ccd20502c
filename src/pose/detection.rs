//! Detector output contract: one person's box, score and 17 keypoints.
//!
//! The detector itself is external. This module only normalises whatever it
//! hands over into typed records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keypoint::{Keypoint, KeypointIndex, Pose};

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("box must be finite and non-negative in size, got [{x}, {y}, {w}, {h}]")]
    InvalidBox { x: f32, y: f32, w: f32, h: f32 },
}

/// 画像座標のボックス (x, y, w, h)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn diagonal(&self) -> f32 {
        (self.w * self.w + self.h * self.h).sqrt()
    }

    pub fn long_side(&self) -> f32 {
        self.w.max(self.h)
    }

    /// 中心を保ったまま ratio 分だけ拡大
    pub fn padded(&self, ratio: f32) -> Self {
        let (cx, cy) = self.center();
        Self::from_center(cx, cy, self.w * (1.0 + ratio), self.h * (1.0 + ratio))
    }

    /// 幅・高さ比のマージンを含めて点が内側にあるか
    pub fn contains_with_margin(&self, x: f32, y: f32, margin_ratio: f32) -> bool {
        let mx = self.w * margin_ratio;
        let my = self.h * margin_ratio;
        x >= self.x - mx && x <= self.x + self.w + mx && y >= self.y - my && y <= self.y + self.h + my
    }

    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite()) && self.w >= 0.0 && self.h >= 0.0
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// フラット配列のキーポイント表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypointEncoding {
    /// [x, y, c, x, y, c, ...]
    #[default]
    Triples,
    /// [x, y, x, y, ...]（信頼度なし → 1.0 とみなす）
    Pairs,
}

impl KeypointEncoding {
    fn stride(self) -> usize {
        match self {
            Self::Triples => 3,
            Self::Pairs => 2,
        }
    }
}

/// 1フレーム・1人分の検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: BBox,
    pub score: f32,
    pub pose: Pose,
}

impl RawDetection {
    pub fn new(bbox: BBox, score: f32, pose: Pose) -> Self {
        Self { bbox, score, pose }
    }

    /// 検出器のフラット配列から構築
    ///
    /// 末尾の不完全な組は捨てる。17個に満たない関節は信頼度0で埋める。
    /// 座標が有限でない関節は無効扱い。
    pub fn from_flat(bbox: BBox, score: f32, flat: &[f32], encoding: KeypointEncoding) -> Self {
        let stride = encoding.stride();
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (slot, chunk) in keypoints.iter_mut().zip(flat.chunks_exact(stride)) {
            let (x, y) = (chunk[0], chunk[1]);
            let confidence = match encoding {
                KeypointEncoding::Triples => chunk[2],
                KeypointEncoding::Pairs => 1.0,
            };
            *slot = sanitize_keypoint(x, y, confidence);
        }
        Self {
            bbox,
            score: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
            pose: Pose::new(keypoints),
        }
    }
}

fn sanitize_keypoint(x: f32, y: f32, confidence: f32) -> Keypoint {
    if !x.is_finite() || !y.is_finite() || !confidence.is_finite() {
        return Keypoint::new(
            if x.is_finite() { x } else { 0.0 },
            if y.is_finite() { y } else { 0.0 },
            0.0,
        );
    }
    Keypoint::new(x, y, confidence.clamp(0.0, 1.0))
}

/// JSON 等でやり取りする検出レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
    #[serde(default)]
    pub keypoints: Vec<f32>,
    /// true のとき keypoints は (x, y) の組
    #[serde(default)]
    pub pairs: bool,
}

impl TryFrom<&DetectionRecord> for RawDetection {
    type Error = IngestError;

    fn try_from(record: &DetectionRecord) -> Result<Self, Self::Error> {
        let bbox = BBox::new(record.x, record.y, record.w, record.h);
        if !bbox.is_well_formed() {
            return Err(IngestError::InvalidBox {
                x: record.x,
                y: record.y,
                w: record.w,
                h: record.h,
            });
        }
        let encoding = if record.pairs {
            KeypointEncoding::Pairs
        } else {
            KeypointEncoding::Triples
        };
        Ok(RawDetection::from_flat(bbox, record.score, &record.keypoints, encoding))
    }
}
