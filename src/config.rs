use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::tracker::FilterParams;

/// 設定値の整合性エラー
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("tracker.gate_min ({min}) exceeds tracker.gate_max ({max})")]
    GateBounds { min: f32, max: f32 },
    #[error("gesture.vote_buffer_size must be at least 1")]
    EmptyVoteBuffer,
    #[error("quality weights must be non-negative and not all zero")]
    QualityWeights,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub bounds: BoundsConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub kinematics: KinematicsConfig,
    #[serde(default)]
    pub anatomy: AnatomyConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// 検出スコアの下限（これ未満の検出は関連付け前に捨てる）
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// キーポイント信頼度の下限（これ未満は信頼度0に落とす）
    #[serde(default = "default_keypoint_confidence")]
    pub keypoint_confidence: f32,
}

fn default_min_score() -> f32 { 0.4 }
fn default_keypoint_confidence() -> f32 { 0.30 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            keypoint_confidence: default_keypoint_confidence(),
        }
    }
}

/// One Euro フィルタのパラメータ（チャンネル種別ごと）
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FilterConfig {
    /// ボックス (cx, cy, w, h)
    #[serde(default = "default_box_filter", deserialize_with = "box_filter")]
    pub bbox: FilterParams,
    /// 体幹（頭・肩・腰）
    #[serde(default = "default_core_filter", deserialize_with = "core_filter")]
    pub core: FilterParams,
    /// 四肢（肘・膝・手首・足首）
    #[serde(default = "default_limb_filter", deserialize_with = "limb_filter")]
    pub limb: FilterParams,
}

/// `[filter.*]` の表。書かれていない項目はチャンネル種別ごとのデフォルトを使う
#[derive(Debug, Deserialize)]
struct FilterTable {
    min_cutoff: Option<f32>,
    beta: Option<f32>,
    d_cutoff: Option<f32>,
}

impl FilterTable {
    fn merge(self, base: FilterParams) -> FilterParams {
        FilterParams::new(
            self.min_cutoff.unwrap_or(base.min_cutoff),
            self.beta.unwrap_or(base.beta),
            self.d_cutoff.unwrap_or(base.d_cutoff),
        )
    }
}

fn box_filter<'de, D: Deserializer<'de>>(d: D) -> Result<FilterParams, D::Error> {
    Ok(FilterTable::deserialize(d)?.merge(default_box_filter()))
}
fn core_filter<'de, D: Deserializer<'de>>(d: D) -> Result<FilterParams, D::Error> {
    Ok(FilterTable::deserialize(d)?.merge(default_core_filter()))
}
fn limb_filter<'de, D: Deserializer<'de>>(d: D) -> Result<FilterParams, D::Error> {
    Ok(FilterTable::deserialize(d)?.merge(default_limb_filter()))
}

fn default_box_filter() -> FilterParams {
    FilterParams::new(0.01, 0.7, 1.0)
}
fn default_core_filter() -> FilterParams {
    FilterParams::new(0.1, 0.1, 1.0)
}
fn default_limb_filter() -> FilterParams {
    FilterParams::new(0.3, 0.2, 1.0)
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bbox: default_box_filter(),
            core: default_core_filter(),
            limb: default_limb_filter(),
        }
    }
}

/// ボックス外許容マージン（ボックス幅・高さに対する比率）
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BoundsConfig {
    pub core_margin: f32,
    pub mid_margin: f32,
    pub extremity_margin: f32,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            core_margin: 0.05,
            mid_margin: 0.10,
            extremity_margin: 0.20,
        }
    }
}

/// ボックス内の領域制約（立ち姿勢で頭が足元に来る等のゴースト除去）
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ZoneConfig {
    pub enabled: bool,
    /// 頭・肩はボックス上端からこの比率より下に来てはいけない
    pub head_zone: f32,
    /// 手首はボックス上端からこの比率より下に来てはいけない
    pub wrist_zone: f32,
    /// この比率より下（床付近）は高信頼度のみ許可
    pub floor_zone: f32,
    pub floor_min_confidence: f32,
    /// ボックス端からこの比率以内は高信頼度のみ許可
    pub edge_band: f32,
    pub edge_min_confidence: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            head_zone: 0.6,
            wrist_zone: 0.85,
            floor_zone: 0.95,
            floor_min_confidence: 0.85,
            edge_band: 0.05,
            edge_min_confidence: 0.75,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KinematicsConfig {
    /// 骨長の許容帯 [1 - tolerance, 1 + tolerance]
    pub tolerance: f32,
    /// 上限 × multiplier を超えたら子関節を無効化
    pub deletion_multiplier: f32,
    /// 胴長（肩中点〜腰中点）から身長を推定する係数
    pub torso_to_height: f32,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.3,
            deletion_multiplier: 2.0,
            torso_to_height: 3.4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnatomyConfig {
    pub min_valid_keypoints: usize,
    pub require_core_joint: bool,
    /// 骨格重心とボックス中心の許容距離（ボックス対角線比）
    pub max_centroid_offset: f32,
    /// h > w * upright_aspect のとき立ち姿勢とみなし上下関係を検査
    pub upright_aspect: f32,
    /// 肩が腰より下にあってよい許容量（ピクセル）
    pub vertical_slack: f32,
}

impl Default for AnatomyConfig {
    fn default() -> Self {
        Self {
            min_valid_keypoints: 4,
            require_core_joint: true,
            max_centroid_offset: 0.4,
            upright_aspect: 1.1,
            vertical_slack: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QualityConfig {
    pub structural_weight: f32,
    pub symmetry_weight: f32,
    pub kinematic_weight: f32,
    pub temporal_weight: f32,
    pub coverage_weight: f32,
    /// 前フレームなしのときの時間安定性スコア
    pub neutral_temporal: f32,
    /// 体格比でこの変位に達すると時間安定性0
    pub displacement_limit: f32,
    /// 体格比でこの左右高さ差に達すると対称性0
    pub symmetry_limit: f32,
    /// 重心からこの距離（体格比）を超える関節は外れ値
    pub outlier_distance: f32,
    pub excellent: f32,
    pub good: f32,
    pub fair: f32,
    pub poor: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            structural_weight: 0.25,
            symmetry_weight: 0.15,
            kinematic_weight: 0.20,
            temporal_weight: 0.20,
            coverage_weight: 0.20,
            neutral_temporal: 0.5,
            displacement_limit: 0.15,
            symmetry_limit: 0.25,
            outlier_distance: 0.9,
            excellent: 0.85,
            good: 0.70,
            fair: 0.50,
            poor: 0.30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// 関連付けゲート = ボックス長辺 × gate_ratio を [gate_min, gate_max] にクランプ
    pub gate_ratio: f32,
    pub gate_min: f32,
    pub gate_max: f32,
    /// このフレーム数を超えて見失ったら削除
    pub max_misses: u32,
    /// ボックスの余白（中心基準で拡大）
    pub box_padding: f32,
    /// 1回の更新で許す中心移動量（ピクセル）。0 で制限なし
    pub max_center_step: Option<f32>,
    /// 1回の更新で許すサイズ変化量（ピクセル）。0 で制限なし
    pub max_size_step: Option<f32>,
    /// 速度のEMA係数
    pub velocity_smoothing: f32,
    /// 速度の上限（ピクセル/秒）
    pub max_speed: f32,
    /// 見失ったフレームごとに速度へ掛ける減衰
    pub miss_velocity_decay: f32,
    /// ゲート用予測の最大外挿時間（秒）
    pub max_prediction: f32,
}

fn step_limit(step: Option<f32>) -> Option<f32> {
    step.filter(|s| *s > 0.0)
}

impl TrackerConfig {
    /// 中心移動量の制限。None または 0 なら制限しない
    pub fn center_step_limit(&self) -> Option<f32> {
        step_limit(self.max_center_step)
    }

    pub fn size_step_limit(&self) -> Option<f32> {
        step_limit(self.max_size_step)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gate_ratio: 0.6,
            gate_min: 30.0,
            gate_max: 150.0,
            max_misses: 10,
            box_padding: 0.05,
            max_center_step: Some(20.0),
            max_size_step: Some(10.0),
            velocity_smoothing: 0.2,
            max_speed: 300.0,
            miss_velocity_decay: 0.4,
            max_prediction: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GestureConfig {
    /// 腕の3関節（肩・肘・手首）に要求する信頼度
    pub min_joint_confidence: f32,
    pub vote_buffer_size: usize,
    /// 最頻ラベル集合がバッファ長のこの比率を超えたときだけ出力
    pub acceptance_fraction: f32,
    /// 手首の間隔がこの比率 × 肩幅未満なら頭上交差
    pub cross_max_separation: f32,
    /// T字判定に必要な肘の内角（度）
    pub straight_elbow_angle: f32,
    pub wave_window: usize,
    /// 手振りの振幅（肩幅比）
    pub wave_min_amplitude: f32,
    pub wave_min_reversals: usize,
    /// 方向反転とみなさない微小変化（肩幅比）
    pub wave_deadband: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_joint_confidence: 0.3,
            vote_buffer_size: 10,
            acceptance_fraction: 0.6,
            cross_max_separation: 0.8,
            straight_elbow_angle: 150.0,
            wave_window: 15,
            wave_min_amplitude: 0.3,
            wave_min_reversals: 2,
            wave_deadband: 0.02,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    /// イベント送出の最小間隔（秒）
    pub min_interval: f64,
    /// 同じイベントを保持し続けた場合の再送間隔（秒）
    pub repeat_interval: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            min_interval: 1.0,
            repeat_interval: 3.0,
        }
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, min, max })
    }
}

fn check_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読めなければデフォルト設定で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("using default config ({}): {:#}", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("detection.min_score", self.detection.min_score, 0.0, 1.0)?;
        check_range("detection.keypoint_confidence", self.detection.keypoint_confidence, 0.0, 1.0)?;

        for (field, params) in [
            ("filter.bbox", &self.filter.bbox),
            ("filter.core", &self.filter.core),
            ("filter.limb", &self.filter.limb),
        ] {
            check_positive(field, params.min_cutoff)?;
            check_positive(field, params.d_cutoff)?;
            check_range(field, params.beta, 0.0, f32::MAX)?;
        }

        check_range("bounds.core_margin", self.bounds.core_margin, 0.0, 10.0)?;
        check_range("bounds.mid_margin", self.bounds.mid_margin, 0.0, 10.0)?;
        check_range("bounds.extremity_margin", self.bounds.extremity_margin, 0.0, 10.0)?;

        check_range("zone.head_zone", self.zone.head_zone, 0.0, 1.0)?;
        check_range("zone.wrist_zone", self.zone.wrist_zone, 0.0, 1.0)?;
        check_range("zone.floor_zone", self.zone.floor_zone, 0.0, 1.0)?;
        check_range("zone.edge_band", self.zone.edge_band, 0.0, 0.5)?;

        check_range("kinematics.tolerance", self.kinematics.tolerance, 0.0, 0.99)?;
        check_range("kinematics.deletion_multiplier", self.kinematics.deletion_multiplier, 1.0, f32::MAX)?;
        check_positive("kinematics.torso_to_height", self.kinematics.torso_to_height)?;

        check_range("anatomy.max_centroid_offset", self.anatomy.max_centroid_offset, 0.0, 1.0)?;

        let q = &self.quality;
        let weights = [
            q.structural_weight,
            q.symmetry_weight,
            q.kinematic_weight,
            q.temporal_weight,
            q.coverage_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f32>() <= 0.0 {
            return Err(ConfigError::QualityWeights);
        }
        check_range("quality.neutral_temporal", q.neutral_temporal, 0.0, 1.0)?;
        check_positive("quality.displacement_limit", q.displacement_limit)?;
        check_positive("quality.symmetry_limit", q.symmetry_limit)?;
        check_positive("quality.outlier_distance", q.outlier_distance)?;

        let t = &self.tracker;
        check_positive("tracker.gate_min", t.gate_min)?;
        if t.gate_min > t.gate_max {
            return Err(ConfigError::GateBounds { min: t.gate_min, max: t.gate_max });
        }
        check_positive("tracker.gate_ratio", t.gate_ratio)?;
        check_range("tracker.box_padding", t.box_padding, 0.0, 1.0)?;
        check_range("tracker.velocity_smoothing", t.velocity_smoothing, 0.0, 1.0)?;
        check_range("tracker.miss_velocity_decay", t.miss_velocity_decay, 0.0, 1.0)?;
        check_range("tracker.max_prediction", t.max_prediction, 0.0, f32::MAX)?;
        check_range("tracker.max_speed", t.max_speed, 0.0, f32::MAX)?;
        if let Some(step) = t.max_center_step {
            check_range("tracker.max_center_step", step, 0.0, f32::MAX)?;
        }
        if let Some(step) = t.max_size_step {
            check_range("tracker.max_size_step", step, 0.0, f32::MAX)?;
        }

        let g = &self.gesture;
        if g.vote_buffer_size == 0 {
            return Err(ConfigError::EmptyVoteBuffer);
        }
        check_range("gesture.acceptance_fraction", g.acceptance_fraction, f32::MIN_POSITIVE, 1.0)?;
        check_range("gesture.min_joint_confidence", g.min_joint_confidence, 0.0, 1.0)?;
        check_positive("gesture.wave_min_amplitude", g.wave_min_amplitude)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tracker]
            max_misses = 3

            [filter.core]
            min_cutoff = 0.5
            beta = 0.0
            d_cutoff = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.tracker.max_misses, 3);
        assert_eq!(config.tracker.gate_max, TrackerConfig::default().gate_max);
        assert_eq!(config.filter.core.min_cutoff, 0.5);
        assert_eq!(config.filter.limb, default_limb_filter());
    }

    #[test]
    fn test_partial_filter_table_keeps_class_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filter.core]
            min_cutoff = 0.5

            [filter.bbox]
            beta = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.filter.core, FilterParams::new(0.5, 0.1, 1.0));
        assert_eq!(config.filter.bbox, FilterParams::new(0.01, 0.0, 1.0));
        assert_eq!(config.filter.limb, default_limb_filter());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_zero_step_disables_box_limit() {
        let config: Config = toml::from_str(
            r#"
            [tracker]
            max_center_step = 0
            max_size_step = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tracker.center_step_limit(), None);
        assert_eq!(config.tracker.size_step_limit(), None);
        assert_eq!(Config::default().tracker.center_step_limit(), Some(20.0));
    }

    #[test]
    fn test_rejects_negative_step() {
        let mut config = Config::default();
        config.tracker.max_size_step = Some(-1.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "tracker.max_size_step", .. })
        ));
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("posewatch-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_load_reads_file() {
        let path = temp_path("load");
        fs::write(&path, "[gesture]\nvote_buffer_size = 5\n").unwrap();
        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.gesture.vote_buffer_size, 5);
        assert_eq!(config.tracker, TrackerConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = temp_path("invalid");
        fs::write(&path, "[gesture]\nvote_buffer_size = 0\n").unwrap();
        let result = Config::load(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_falls_back() {
        assert_eq!(Config::load_or_default(temp_path("missing")), Config::default());

        let path = temp_path("malformed");
        fs::write(&path, "[tracker\nmax_misses = ").unwrap();
        let config = Config::load_or_default(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_repository_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml")).unwrap();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_rejects_inverted_gate() {
        let mut config = Config::default();
        config.tracker.gate_min = 200.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::GateBounds { min: 200.0, max: 150.0 })
        );
    }

    #[test]
    fn test_rejects_empty_vote_buffer() {
        let mut config = Config::default();
        config.gesture.vote_buffer_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptyVoteBuffer));
    }

    #[test]
    fn test_rejects_zero_weights() {
        let mut config = Config::default();
        config.quality.structural_weight = 0.0;
        config.quality.symmetry_weight = 0.0;
        config.quality.kinematic_weight = 0.0;
        config.quality.temporal_weight = 0.0;
        config.quality.coverage_weight = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::QualityWeights));
    }

    #[test]
    fn test_rejects_tolerance_out_of_range() {
        let mut config = Config::default();
        config.kinematics.tolerance = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "kinematics.tolerance", .. })
        ));
    }
}
