use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// ジェスチャラベル（姿勢・片腕・両腕・動的）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureLabel {
    Standing,
    Sitting,
    Leaning,
    Lying,
    LeftArmUp,
    RightArmUp,
    LeftArmOut,
    RightArmOut,
    BothArmsUp,
    CrossAboveHead,
    TPose,
    WaveLeft,
    WaveRight,
}

impl GestureLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standing => "standing",
            Self::Sitting => "sitting",
            Self::Leaning => "leaning",
            Self::Lying => "lying",
            Self::LeftArmUp => "left-arm-up",
            Self::RightArmUp => "right-arm-up",
            Self::LeftArmOut => "left-arm-out",
            Self::RightArmOut => "right-arm-out",
            Self::BothArmsUp => "both-arms-up",
            Self::CrossAboveHead => "cross-above-head",
            Self::TPose => "t-pose",
            Self::WaveLeft => "wave-left",
            Self::WaveRight => "wave-right",
        }
    }

    pub fn is_composite(self) -> bool {
        matches!(self, Self::BothArmsUp | Self::CrossAboveHead | Self::TPose)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1フレーム分のラベル集合（順序付き）
pub type GestureSet = BTreeSet<GestureLabel>;

/// 体幹の傾きから決まる姿勢
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Standing,
    Sitting,
    Leaning,
    Lying,
}

impl From<Posture> for GestureLabel {
    fn from(p: Posture) -> Self {
        match p {
            Posture::Standing => Self::Standing,
            Posture::Sitting => Self::Sitting,
            Posture::Leaning => Self::Leaning,
            Posture::Lying => Self::Lying,
        }
    }
}

/// 体幹下向き軸と上腕のなす角の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmBand {
    /// 0..20°
    Down,
    /// 20..80°
    Low,
    /// 80..110°（水平）
    Side,
    /// 110..160°
    High,
    /// 160..180°（真上）
    Up,
}

impl ArmBand {
    pub fn from_angle(degrees: f32) -> Self {
        if degrees < 20.0 {
            Self::Down
        } else if degrees < 80.0 {
            Self::Low
        } else if degrees < 110.0 {
            Self::Side
        } else if degrees < 160.0 {
            Self::High
        } else {
            Self::Up
        }
    }

    pub fn is_raised(self) -> bool {
        matches!(self, Self::High | Self::Up)
    }
}
