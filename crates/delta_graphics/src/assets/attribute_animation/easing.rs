//! Robert Penner's easing curves
//!
//! Every curve is expressed on a normalized time `x` in `[0, 1]` and
//! returns the fraction of the change applied at that time, so the eased
//! value is `start + change * curve(t / duration)`.

use std::f32::consts::PI;

const BACK_OVERSHOOT: f32 = 1.70158;
const BACK_IN_OUT_OVERSHOOT: f32 = BACK_OVERSHOOT * 1.525;

/// Interpolation curve between two keyframes
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Easing {
    BackIn,
    BackInOut,
    BackOut,
    BounceIn,
    BounceInOut,
    BounceOut,
    CircIn,
    CircInOut,
    CircOut,
    CubicIn,
    CubicInOut,
    CubicOut,
    ElasticIn,
    ElasticInOut,
    ElasticOut,
    ExpoIn,
    ExpoInOut,
    ExpoOut,
    #[default]
    Linear,
    QuadIn,
    QuadInOut,
    QuadOut,
    QuartIn,
    QuartInOut,
    QuartOut,
    QuintIn,
    QuintInOut,
    QuintOut,
    SineIn,
    SineInOut,
    SineOut,
}

impl Easing {
    /// Every curve, in declaration order
    pub const ALL: [Easing; 31] = [
        Self::BackIn, Self::BackInOut, Self::BackOut,
        Self::BounceIn, Self::BounceInOut, Self::BounceOut,
        Self::CircIn, Self::CircInOut, Self::CircOut,
        Self::CubicIn, Self::CubicInOut, Self::CubicOut,
        Self::ElasticIn, Self::ElasticInOut, Self::ElasticOut,
        Self::ExpoIn, Self::ExpoInOut, Self::ExpoOut,
        Self::Linear,
        Self::QuadIn, Self::QuadInOut, Self::QuadOut,
        Self::QuartIn, Self::QuartInOut, Self::QuartOut,
        Self::QuintIn, Self::QuintInOut, Self::QuintOut,
        Self::SineIn, Self::SineInOut, Self::SineOut,
    ];

    /// Name as written in animation files
    pub fn name(self) -> &'static str {
        match self {
            Self::BackIn => "BackIn",
            Self::BackInOut => "BackInOut",
            Self::BackOut => "BackOut",
            Self::BounceIn => "BounceIn",
            Self::BounceInOut => "BounceInOut",
            Self::BounceOut => "BounceOut",
            Self::CircIn => "CircIn",
            Self::CircInOut => "CircInOut",
            Self::CircOut => "CircOut",
            Self::CubicIn => "CubicIn",
            Self::CubicInOut => "CubicInOut",
            Self::CubicOut => "CubicOut",
            Self::ElasticIn => "ElasticIn",
            Self::ElasticInOut => "ElasticInOut",
            Self::ElasticOut => "ElasticOut",
            Self::ExpoIn => "ExpoIn",
            Self::ExpoInOut => "ExpoInOut",
            Self::ExpoOut => "ExpoOut",
            Self::Linear => "Linear",
            Self::QuadIn => "QuadIn",
            Self::QuadInOut => "QuadInOut",
            Self::QuadOut => "QuadOut",
            Self::QuartIn => "QuartIn",
            Self::QuartInOut => "QuartInOut",
            Self::QuartOut => "QuartOut",
            Self::QuintIn => "QuintIn",
            Self::QuintInOut => "QuintInOut",
            Self::QuintOut => "QuintOut",
            Self::SineIn => "SineIn",
            Self::SineInOut => "SineInOut",
            Self::SineOut => "SineOut",
        }
    }

    /// Parse a curve name; unknown or empty names are linear
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|easing| easing.name() == name)
            .unwrap_or_default()
    }

    /// Eased fraction at normalized time `x`
    pub fn curve(self, x: f32) -> f32 {
        match self {
            Self::Linear => x,

            Self::BackIn => x * x * ((BACK_OVERSHOOT + 1.0) * x - BACK_OVERSHOOT),
            Self::BackOut => {
                let t = x - 1.0;
                t * t * ((BACK_OVERSHOOT + 1.0) * t + BACK_OVERSHOOT) + 1.0
            }
            Self::BackInOut => {
                let s = BACK_IN_OUT_OVERSHOOT;
                let t = x * 2.0;
                if t < 1.0 {
                    0.5 * (t * t * ((s + 1.0) * t - s))
                } else {
                    let t = t - 2.0;
                    0.5 * (t * t * ((s + 1.0) * t + s) + 2.0)
                }
            }

            Self::BounceOut => bounce_out(x),
            Self::BounceIn => 1.0 - bounce_out(1.0 - x),
            Self::BounceInOut => {
                if x < 0.5 {
                    (1.0 - bounce_out(1.0 - x * 2.0)) * 0.5
                } else {
                    bounce_out(x * 2.0 - 1.0) * 0.5 + 0.5
                }
            }

            Self::CircIn => -((1.0 - x * x).sqrt() - 1.0),
            Self::CircOut => {
                let t = x - 1.0;
                (1.0 - t * t).sqrt()
            }
            Self::CircInOut => {
                let t = x * 2.0;
                if t < 1.0 {
                    -0.5 * ((1.0 - t * t).sqrt() - 1.0)
                } else {
                    let t = t - 2.0;
                    0.5 * ((1.0 - t * t).sqrt() + 1.0)
                }
            }

            Self::CubicIn => x.powi(3),
            Self::CubicOut => (x - 1.0).powi(3) + 1.0,
            Self::CubicInOut => in_out(x, |t| 0.5 * t.powi(3), |t| 0.5 * ((t - 2.0).powi(3) + 2.0)),

            Self::ElasticIn => elastic(x, |x| {
                let t = x - 1.0;
                -(2f32.powf(10.0 * t) * ((t - 0.075) * 2.0 * PI / 0.3).sin())
            }),
            Self::ElasticOut => elastic(x, |x| {
                2f32.powf(-10.0 * x) * ((x - 0.075) * 2.0 * PI / 0.3).sin() + 1.0
            }),
            Self::ElasticInOut => elastic(x, |x| {
                let period = 0.45;
                let shift = period / 4.0;
                let t = x * 2.0 - 1.0;
                if x < 0.5 {
                    -0.5 * (2f32.powf(10.0 * t) * ((t - shift) * 2.0 * PI / period).sin())
                } else {
                    2f32.powf(-10.0 * t) * ((t - shift) * 2.0 * PI / period).sin() * 0.5 + 1.0
                }
            }),

            Self::ExpoIn => {
                if x == 0.0 { 0.0 } else { 2f32.powf(10.0 * (x - 1.0)) }
            }
            Self::ExpoOut => {
                if x == 1.0 { 1.0 } else { 1.0 - 2f32.powf(-10.0 * x) }
            }
            Self::ExpoInOut => elastic(x, |x| {
                let t = x * 2.0;
                if t < 1.0 {
                    0.5 * 2f32.powf(10.0 * (t - 1.0))
                } else {
                    0.5 * (2.0 - 2f32.powf(-10.0 * (t - 1.0)))
                }
            }),

            Self::QuadIn => x * x,
            Self::QuadOut => -x * (x - 2.0),
            Self::QuadInOut => in_out(x, |t| 0.5 * t * t, |t| {
                let t = t - 1.0;
                -0.5 * (t * (t - 2.0) - 1.0)
            }),

            Self::QuartIn => x.powi(4),
            Self::QuartOut => 1.0 - (x - 1.0).powi(4),
            Self::QuartInOut => in_out(x, |t| 0.5 * t.powi(4), |t| -0.5 * ((t - 2.0).powi(4) - 2.0)),

            Self::QuintIn => x.powi(5),
            Self::QuintOut => (x - 1.0).powi(5) + 1.0,
            Self::QuintInOut => in_out(x, |t| 0.5 * t.powi(5), |t| 0.5 * ((t - 2.0).powi(5) + 2.0)),

            Self::SineIn => 1.0 - (x * PI / 2.0).cos(),
            Self::SineOut => (x * PI / 2.0).sin(),
            Self::SineInOut => -0.5 * ((PI * x).cos() - 1.0),
        }
    }

    /// Penner form: value at time `t` of a change `change` from `start` over `duration`
    pub fn apply<T>(self, t: f32, start: T, change: T, duration: f32) -> T
    where
        T: std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
    {
        let x = if duration > 0.0 { t / duration } else { 1.0 };
        start + change * self.curve(x)
    }
}

/// Split at the midpoint: `first` and `second` receive `t = 2x`
fn in_out(x: f32, first: impl Fn(f32) -> f32, second: impl Fn(f32) -> f32) -> f32 {
    let t = x * 2.0;
    if t < 1.0 { first(t) } else { second(t) }
}

/// Pin the endpoints of curves whose formula is unstable there
fn elastic(x: f32, curve: impl Fn(f32) -> f32) -> f32 {
    if x <= 0.0 {
        0.0
    } else if x >= 1.0 {
        1.0
    } else {
        curve(x)
    }
}

fn bounce_out(x: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;

    if x < 1.0 / D {
        N * x * x
    } else if x < 2.0 / D {
        let t = x - 1.5 / D;
        N * t * t + 0.75
    } else if x < 2.5 / D {
        let t = x - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = x - 2.625 / D;
        N * t * t + 0.984_375
    }
}
