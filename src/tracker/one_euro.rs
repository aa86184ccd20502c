/// One Euro フィルタのパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// 静止時のカットオフ周波数 (Hz)。小さいほど静止時に滑らか
    pub min_cutoff: f32,
    /// 速度係数。大きいほど速い動きで遅れが少ない
    pub beta: f32,
    /// 微分（速度推定）のカットオフ周波数 (Hz)
    pub d_cutoff: f32,
}

impl FilterParams {
    pub const fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
        }
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelState {
    x_prev: f32,
    dx_prev: f32,
    t_prev: f64,
}

/// 単一スカラーチャンネルの One Euro フィルタ
///
/// 時刻は呼び出し側が渡す（秒）。同じ入力列からは常に同じ出力列になる。
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveFilter {
    params: FilterParams,
    state: Option<ChannelState>,
}

impl AdaptiveFilter {
    pub fn new(params: FilterParams) -> Self {
        Self { params, state: None }
    }

    /// 初回は生の値で初期化（微分0）してそのまま返す
    pub fn filter(&mut self, t: f64, x: f32) -> f32 {
        let prev = match self.state {
            Some(s) => s,
            None => {
                self.state = Some(ChannelState {
                    x_prev: x,
                    dx_prev: 0.0,
                    t_prev: t,
                });
                return x;
            }
        };

        let te = (t - prev.t_prev) as f32;
        if te <= 0.0 {
            return prev.x_prev;
        }

        let a_d = smoothing_factor(te, self.params.d_cutoff);
        let dx = (x - prev.x_prev) / te;
        let dx_hat = a_d * dx + (1.0 - a_d) * prev.dx_prev;

        let cutoff = self.params.min_cutoff + self.params.beta * dx_hat.abs();
        let a = smoothing_factor(te, cutoff);
        let x_hat = a * x + (1.0 - a) * prev.x_prev;

        self.state = Some(ChannelState {
            x_prev: x_hat,
            dx_prev: dx_hat,
            t_prev: t,
        });
        x_hat
    }

    /// 直近の出力値
    pub fn last(&self) -> Option<f32> {
        self.state.map(|s| s.x_prev)
    }

}

/// (x, y) の2チャンネル
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveFilter2D {
    pub x: AdaptiveFilter,
    pub y: AdaptiveFilter,
}

impl AdaptiveFilter2D {
    pub fn new(params: FilterParams) -> Self {
        Self {
            x: AdaptiveFilter::new(params),
            y: AdaptiveFilter::new(params),
        }
    }

    pub fn filter(&mut self, t: f64, pos: (f32, f32)) -> (f32, f32) {
        (self.x.filter(t, pos.0), self.y.filter(t, pos.1))
    }

    pub fn last(&self) -> Option<(f32, f32)> {
        Some((self.x.last()?, self.y.last()?))
    }
}
