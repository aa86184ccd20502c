use tracing::debug;

use crate::config::{Config, TrackerConfig};
use crate::pose::{BBox, Pose, RawDetection};

use super::geometry::{GeometryFilter, IdentityFilters};

/// 外部に見せるトラックID。単調増加で再利用しない
pub type TrackId = u64;

/// アリーナ内のスロット参照。スロットが再利用されると世代が変わり無効になる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle {
    index: usize,
    generation: u32,
}

/// 追跡中の1人分
#[derive(Debug, Clone)]
pub struct Track<S> {
    id: TrackId,
    bbox: BBox,
    score: f32,
    /// 平滑化ボックス中心の速度（ピクセル/秒）
    velocity: (f32, f32),
    miss_count: u32,
    hits: u32,
    last_update: f64,
    filters: IdentityFilters,
    /// パイプライン側の状態（姿勢履歴・ジェスチャ等）
    pub state: S,
}

impl<S> Track<S> {
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// 平滑化済みボックス
    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.velocity
    }

    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    /// このフレームで検出と対応付いた
    pub fn is_visible(&self) -> bool {
        self.miss_count == 0
    }

    /// 関連付け用の予測中心。外挿時間は max_prediction で打ち切る
    fn predicted_center(&self, t: f64, max_prediction: f32) -> (f32, f32) {
        let dt = ((t - self.last_update) as f32).clamp(0.0, max_prediction);
        let (cx, cy) = self.bbox.center();
        (cx + self.velocity.0 * dt, cy + self.velocity.1 * dt)
    }
}

#[derive(Debug, Clone)]
struct Slot<S> {
    generation: u32,
    track: Option<Track<S>>,
}

/// 貪欲な最近傍中心マッチングによる ID 追跡
///
/// 既存トラックを ID 順に見て、ゲート内で最も近い未割当の検出を割り当てる。
/// 残った検出は新規登録、見失いが max_misses を超えたトラックは削除する。
#[derive(Debug, Clone)]
pub struct IdentityTracker<S> {
    config: TrackerConfig,
    min_score: f32,
    geometry: GeometryFilter,
    slots: Vec<Slot<S>>,
    next_id: TrackId,
}

impl<S: Default> IdentityTracker<S> {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.tracker.clone(),
            min_score: config.detection.min_score,
            geometry: GeometryFilter::from_config(config),
            slots: Vec::new(),
            next_id: 1,
        }
    }

    pub fn geometry(&self) -> &GeometryFilter {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.track.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: TrackHandle) -> Option<&Track<S>> {
        self.slots
            .get(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.track.as_ref())
    }

    pub fn get_mut(&mut self, handle: TrackHandle) -> Option<&mut Track<S>> {
        self.slots
            .get_mut(handle.index)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.track.as_mut())
    }

    /// 生存中トラックのハンドルを ID 昇順で
    pub fn handles(&self) -> Vec<TrackHandle> {
        let mut live: Vec<(TrackId, TrackHandle)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.track.as_ref().map(|t| {
                    (
                        t.id,
                        TrackHandle {
                            index,
                            generation: slot.generation,
                        },
                    )
                })
            })
            .collect();
        live.sort_by_key(|(id, _)| *id);
        live.into_iter().map(|(_, h)| h).collect()
    }

    /// 生存中トラックを ID 昇順で
    pub fn tracks(&self) -> impl Iterator<Item = &Track<S>> + '_ {
        self.handles().into_iter().filter_map(move |h| self.get(h))
    }

    fn gate(&self, bbox: &BBox) -> f32 {
        (bbox.long_side() * self.config.gate_ratio).clamp(self.config.gate_min, self.config.gate_max)
    }

    /// 1フレーム分の検出で更新
    ///
    /// 戻り値は (トラック, 検出インデックス) の組。新規登録分も含み ID 昇順。
    /// スコアが min_score 未満の検出は無視する。
    pub fn update(&mut self, t: f64, detections: &[RawDetection]) -> Vec<(TrackHandle, usize)> {
        let mut unmatched: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.score >= self.min_score && d.bbox.is_well_formed())
            .map(|(i, _)| i)
            .collect();
        let mut matches = Vec::with_capacity(detections.len());

        for handle in self.handles() {
            let Some(track) = self.get(handle) else { continue };
            let (px, py) = track.predicted_center(t, self.config.max_prediction);
            let gate = self.gate(&track.bbox);

            let mut best: Option<(usize, f32)> = None;
            for (pos, &det_index) in unmatched.iter().enumerate() {
                let (dx, dy) = detections[det_index].bbox.center();
                let distance = ((dx - px).powi(2) + (dy - py).powi(2)).sqrt();
                if distance <= gate && best.map_or(true, |(_, d)| distance < d) {
                    best = Some((pos, distance));
                }
            }

            match best {
                Some((pos, _)) => {
                    let det_index = unmatched.remove(pos);
                    self.apply_match(handle, t, &detections[det_index]);
                    matches.push((handle, det_index));
                }
                None => self.apply_miss(handle),
            }
        }

        self.expire();

        for det_index in unmatched {
            let handle = self.register(t, &detections[det_index]);
            matches.push((handle, det_index));
        }
        matches
    }

    fn apply_match(&mut self, handle: TrackHandle, t: f64, detection: &RawDetection) {
        let smoothing = self.config.velocity_smoothing;
        let max_speed = self.config.max_speed;
        let geometry = &self.geometry;
        let Some(track) = self
            .slots
            .get_mut(handle.index)
            .and_then(|s| s.track.as_mut())
        else {
            return;
        };

        let (ox, oy) = track.bbox.center();
        let bbox = geometry.filter_box(&mut track.filters, t, &detection.bbox);
        let (nx, ny) = bbox.center();

        let dt = (t - track.last_update) as f32;
        if dt > 0.0 {
            let (vx, vy) = track.velocity;
            let mut vx = vx + smoothing * ((nx - ox) / dt - vx);
            let mut vy = vy + smoothing * ((ny - oy) / dt - vy);
            let speed = (vx * vx + vy * vy).sqrt();
            if speed > max_speed && speed > 0.0 {
                let s = max_speed / speed;
                vx *= s;
                vy *= s;
            }
            track.velocity = (vx, vy);
        }

        track.bbox = bbox;
        track.score = detection.score;
        track.miss_count = 0;
        track.hits += 1;
        track.last_update = t;
    }

    fn apply_miss(&mut self, handle: TrackHandle) {
        let decay = self.config.miss_velocity_decay;
        if let Some(track) = self.get_mut(handle) {
            track.miss_count += 1;
            track.velocity = (track.velocity.0 * decay, track.velocity.1 * decay);
        }
    }

    fn expire(&mut self) {
        let max_misses = self.config.max_misses;
        for slot in self.slots.iter_mut() {
            if slot.track.as_ref().is_some_and(|t| t.miss_count > max_misses) {
                if let Some(track) = slot.track.take() {
                    debug!(id = track.id, hits = track.hits, "identity expired");
                }
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    fn register(&mut self, t: f64, detection: &RawDetection) -> TrackHandle {
        let id = self.next_id;
        self.next_id += 1;

        let mut filters = self.geometry.new_channels();
        let bbox = self.geometry.filter_box(&mut filters, t, &detection.bbox);
        let track = Track {
            id,
            bbox,
            score: detection.score,
            velocity: (0.0, 0.0),
            miss_count: 0,
            hits: 1,
            last_update: t,
            filters,
            state: S::default(),
        };
        debug!(id, x = bbox.x, y = bbox.y, w = bbox.w, h = bbox.h, "identity registered");

        let index = match self.slots.iter().position(|s| s.track.is_none()) {
            Some(index) => {
                self.slots[index].track = Some(track);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    track: Some(track),
                });
                self.slots.len() - 1
            }
        };
        TrackHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// 対応付いた検出のキーポイントを、そのトラックのフィルタと現在のボックスで処理
    pub fn filter_keypoints(&mut self, handle: TrackHandle, t: f64, raw: &Pose) -> Option<Pose> {
        let geometry = &self.geometry;
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let track = slot.track.as_mut()?;
        let bbox = track.bbox;
        Some(geometry.filter_keypoints(&mut track.filters, t, raw, &bbox))
    }

    /// 検出をスキップしたフレーム用。状態は変えずに見えているトラックをそのまま返す
    pub fn predict(&self) -> Vec<&Track<S>> {
        self.tracks().filter(|t| t.is_visible()).collect()
    }
}
