use std::collections::VecDeque;

use crate::config::GestureConfig;

/// 手首の横方向変位の短い履歴から手振りを検出
///
/// 標本が途切れた（腕が下りた・見えない）ら履歴を捨てる。
#[derive(Debug, Clone, PartialEq)]
pub struct WaveDetector {
    window: usize,
    min_amplitude: f32,
    min_reversals: usize,
    deadband: f32,
    history: VecDeque<f32>,
}

impl WaveDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            window: config.wave_window.max(3),
            min_amplitude: config.wave_min_amplitude,
            min_reversals: config.wave_min_reversals,
            deadband: config.wave_deadband,
            history: VecDeque::with_capacity(config.wave_window.max(3)),
        }
    }

    pub fn update(&mut self, sample: Option<f32>) -> bool {
        let Some(value) = sample else {
            self.history.clear();
            return false;
        };
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(value);
        self.is_waving()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn amplitude(&self) -> f32 {
        let (min, max) = self
            .history
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if self.history.is_empty() {
            0.0
        } else {
            max - min
        }
    }

    /// 不感帯を超える変化の向きが反転した回数
    pub fn reversals(&self) -> usize {
        let mut count = 0;
        let mut direction = 0i8;
        for (a, b) in self.history.iter().zip(self.history.iter().skip(1)) {
            let d = b - a;
            if d.abs() < self.deadband {
                continue;
            }
            let sign = if d > 0.0 { 1 } else { -1 };
            if direction != 0 && sign != direction {
                count += 1;
            }
            direction = sign;
        }
        count
    }

    pub fn is_waving(&self) -> bool {
        self.history.len() >= 3
            && self.amplitude() > self.min_amplitude
            && self.reversals() >= self.min_reversals
    }
}
