use crate::config::{BoundsConfig, Config, FilterConfig, ZoneConfig};
use crate::pose::{BBox, JointClass, Keypoint, KeypointIndex, Pose};

use super::one_euro::{AdaptiveFilter, AdaptiveFilter2D, FilterParams};

/// ボックスの4チャンネル (cx, cy, w, h)
#[derive(Debug, Clone, PartialEq)]
pub struct BoxChannels {
    cx: AdaptiveFilter,
    cy: AdaptiveFilter,
    w: AdaptiveFilter,
    h: AdaptiveFilter,
}

impl BoxChannels {
    fn new(params: FilterParams) -> Self {
        Self {
            cx: AdaptiveFilter::new(params),
            cy: AdaptiveFilter::new(params),
            w: AdaptiveFilter::new(params),
            h: AdaptiveFilter::new(params),
        }
    }

    fn last(&self) -> Option<BBox> {
        Some(BBox::from_center(
            self.cx.last()?,
            self.cy.last()?,
            self.w.last()?,
            self.h.last()?,
        ))
    }
}

/// トラック1つ分のフィルタ状態
///
/// キーポイントのチャンネルはその関節を初めて信頼できる形で見たときに作る。
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityFilters {
    bbox: BoxChannels,
    keypoints: [Option<AdaptiveFilter2D>; KeypointIndex::COUNT],
}

impl IdentityFilters {
    /// 関節の最後に平滑化された位置
    pub fn last_position(&self, index: KeypointIndex) -> Option<(f32, f32)> {
        self.keypoints[index as usize].as_ref().and_then(|f| f.last())
    }
}

/// ボックスとキーポイントの平滑化・信頼度ゲート・ボックス整合チェック
#[derive(Debug, Clone)]
pub struct GeometryFilter {
    filter: FilterConfig,
    bounds: BoundsConfig,
    zone: ZoneConfig,
    keypoint_confidence: f32,
    box_padding: f32,
    max_center_step: Option<f32>,
    max_size_step: Option<f32>,
}

fn clamp_step(prev: f32, target: f32, max_step: Option<f32>) -> f32 {
    match max_step {
        Some(step) => target.clamp(prev - step, prev + step),
        None => target,
    }
}

impl GeometryFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: config.filter.clone(),
            bounds: config.bounds.clone(),
            zone: config.zone.clone(),
            keypoint_confidence: config.detection.keypoint_confidence,
            box_padding: config.tracker.box_padding,
            max_center_step: config.tracker.center_step_limit(),
            max_size_step: config.tracker.size_step_limit(),
        }
    }

    pub fn new_channels(&self) -> IdentityFilters {
        IdentityFilters {
            bbox: BoxChannels::new(self.filter.bbox),
            keypoints: Default::default(),
        }
    }

    fn keypoint_params(&self, class: JointClass) -> FilterParams {
        match class {
            JointClass::Core => self.filter.core,
            JointClass::Mid | JointClass::Extremity => self.filter.limb,
        }
    }

    pub fn margin(&self, class: JointClass) -> f32 {
        match class {
            JointClass::Core => self.bounds.core_margin,
            JointClass::Mid => self.bounds.mid_margin,
            JointClass::Extremity => self.bounds.extremity_margin,
        }
    }

    /// ボックスを余白付け → 変化量制限 → One Euro の順で平滑化
    pub fn filter_box(&self, channels: &mut IdentityFilters, t: f64, raw: &BBox) -> BBox {
        let padded = raw.padded(self.box_padding);
        let (mut cx, mut cy) = padded.center();
        let (mut w, mut h) = (padded.w, padded.h);

        if let Some(prev) = channels.bbox.last() {
            let (pcx, pcy) = prev.center();
            cx = clamp_step(pcx, cx, self.max_center_step);
            cy = clamp_step(pcy, cy, self.max_center_step);
            w = clamp_step(prev.w, w, self.max_size_step);
            h = clamp_step(prev.h, h, self.max_size_step);
        }

        let b = &mut channels.bbox;
        BBox::from_center(
            b.cx.filter(t, cx),
            b.cy.filter(t, cy),
            b.w.filter(t, w).max(0.0),
            b.h.filter(t, h).max(0.0),
        )
    }

    /// キーポイントの信頼度ゲート・平滑化・ボックス整合チェック
    ///
    /// ゲートで落ちた関節は信頼度0で返す。位置は前回の平滑化位置があればそれを使い、
    /// フィルタ状態は更新しない。
    pub fn filter_keypoints(
        &self,
        channels: &mut IdentityFilters,
        t: f64,
        raw: &Pose,
        current: &BBox,
    ) -> Pose {
        let mut out = Pose::default();
        for idx in KeypointIndex::ALL {
            let kp = raw.get(idx);
            let finite = kp.x.is_finite() && kp.y.is_finite();
            if !finite || !kp.is_valid(self.keypoint_confidence) || !self.passes_zone(idx, kp, current) {
                let fallback = if finite { (kp.x, kp.y) } else { (0.0, 0.0) };
                let (x, y) = channels.last_position(idx).unwrap_or(fallback);
                *out.get_mut(idx) = Keypoint::new(x, y, 0.0);
                continue;
            }

            let params = self.keypoint_params(idx.class());
            let filter = channels.keypoints[idx as usize].get_or_insert_with(|| AdaptiveFilter2D::new(params));
            let (fx, fy) = filter.filter(t, kp.position());

            let confidence = if current.contains_with_margin(fx, fy, self.margin(idx.class())) {
                kp.confidence
            } else {
                0.0
            };
            *out.get_mut(idx) = Keypoint::new(fx, fy, confidence);
        }
        out
    }

    /// ボックスのマージン外にある関節を無効化。無効化した数を返す
    pub fn enforce_bounds(&self, pose: &mut Pose, current: &BBox) -> usize {
        let mut dropped = 0;
        for idx in KeypointIndex::ALL {
            let margin = self.margin(idx.class());
            let kp = pose.get_mut(idx);
            if kp.confidence > 0.0 && !current.contains_with_margin(kp.x, kp.y, margin) {
                kp.invalidate();
                dropped += 1;
            }
        }
        dropped
    }

    /// 領域制約（頭が足元・手首が床・ボックス端の低信頼度点）
    fn passes_zone(&self, idx: KeypointIndex, kp: &Keypoint, b: &BBox) -> bool {
        use KeypointIndex::*;
        let zone = &self.zone;
        if !zone.enabled || b.w <= 0.0 || b.h <= 0.0 {
            return true;
        }

        let rel_y = (kp.y - b.y) / b.h;
        if b.h > b.w {
            let upper_body = idx.is_head() || matches!(idx, LeftShoulder | RightShoulder);
            if upper_body && rel_y > zone.head_zone {
                return false;
            }
            if matches!(idx, LeftWrist | RightWrist) && rel_y > zone.wrist_zone {
                return false;
            }
        }

        if rel_y > zone.floor_zone && kp.confidence < zone.floor_min_confidence {
            return false;
        }

        let edge_x = (kp.x - b.x).abs().min((b.x + b.w - kp.x).abs());
        let edge_y = (kp.y - b.y).abs().min((b.y + b.h - kp.y).abs());
        let near_edge = edge_x < b.w * zone.edge_band || edge_y < b.h * zone.edge_band;
        !(near_edge && kp.confidence < zone.edge_min_confidence)
    }
}
