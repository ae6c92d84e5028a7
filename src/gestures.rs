use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::Thresholds;

/// Stabilized hand gestures, named after the landmark model's categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandGesture {
    #[serde(rename = "Closed_Fist")]
    ClosedFist,
    #[serde(rename = "Open_Palm")]
    OpenPalm,
    #[serde(rename = "Pointing_Up")]
    PointingUp,
    #[serde(rename = "Thumb_Down")]
    ThumbDown,
    #[serde(rename = "Thumb_Up")]
    ThumbUp,
    Victory,
    #[serde(rename = "ILoveYou")]
    ILoveYou,
}

impl HandGesture {
    /// Maps a classifier category; the model's "None" and unknown labels map to `None`.
    pub fn from_category(name: &str) -> Option<Self> {
        Some(match name {
            "Closed_Fist" => Self::ClosedFist,
            "Open_Palm" => Self::OpenPalm,
            "Pointing_Up" => Self::PointingUp,
            "Thumb_Down" => Self::ThumbDown,
            "Thumb_Up" => Self::ThumbUp,
            "Victory" => Self::Victory,
            "ILoveYou" => Self::ILoveYou,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClosedFist => "Closed_Fist",
            Self::OpenPalm => "Open_Palm",
            Self::PointingUp => "Pointing_Up",
            Self::ThumbDown => "Thumb_Down",
            Self::ThumbUp => "Thumb_Up",
            Self::Victory => "Victory",
            Self::ILoveYou => "ILoveYou",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeParams {
    pub window: usize,
    pub min_samples: usize,
    pub distance: f32,
    pub fast_distance: f32,
    /// Normalized units per second.
    pub velocity: f32,
    pub cooldown_ms: u64,
}

impl Default for SwipeParams {
    fn default() -> Self {
        Self {
            window: 10,
            min_samples: 3,
            distance: 0.08,
            fast_distance: 0.05,
            velocity: 0.3,
            cooldown_ms: 300,
        }
    }
}

impl From<&Thresholds> for SwipeParams {
    fn from(th: &Thresholds) -> Self {
        Self {
            window: th.swipe_window,
            min_samples: th.swipe_min_samples,
            distance: th.swipe_distance,
            fast_distance: th.swipe_fast_distance,
            velocity: th.swipe_velocity,
            cooldown_ms: th.swipe_cooldown_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    x: f32,
    t_ms: u64,
}

/// Horizontal swipe recognizer for a held Victory pose.
///
/// Keeps a short window of mirrored x samples and fires when the displacement across the window
/// is large, or moderately large but fast. Both branches matter: the first catches slow
/// deliberate swipes, the second quick flicks that end before travelling far.
#[derive(Debug, Clone)]
pub struct SwipeDetector {
    params: SwipeParams,
    history: VecDeque<Sample>,
    cooldown_until_ms: Option<u64>,
}

impl Default for SwipeDetector {
    fn default() -> Self {
        Self::new(SwipeParams::default())
    }
}

impl SwipeDetector {
    pub fn new(params: SwipeParams) -> Self {
        Self {
            params,
            history: VecDeque::with_capacity(params.window + 1),
            cooldown_until_ms: None,
        }
    }

    pub fn set_params(&mut self, params: SwipeParams) {
        self.params = params;
        while self.history.len() > params.window {
            self.history.pop_front();
        }
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn in_cooldown(&self, now_ms: u64) -> bool {
        self.cooldown_until_ms.is_some_and(|until| now_ms < until)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Drops history and cooldown.
    pub fn reset(&mut self) {
        self.history.clear();
        self.cooldown_until_ms = None;
    }

    /// Feeds one frame. `x` is the mirrored anchor position, `victory` whether the pose is held.
    pub fn update(&mut self, x: f32, t_ms: u64, victory: bool) -> Option<SwipeDirection> {
        if !victory {
            // a swipe never spans two separate Victory holds
            self.history.clear();
            return None;
        }

        if self.in_cooldown(t_ms) {
            return None;
        }
        self.cooldown_until_ms = None;

        self.history.push_back(Sample { x, t_ms });
        while self.history.len() > self.params.window {
            self.history.pop_front();
        }
        if self.history.len() < self.params.min_samples {
            return None;
        }

        let (oldest, newest) = match (self.history.front(), self.history.back()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return None,
        };
        let dx = newest.x - oldest.x;
        let dt_ms = newest.t_ms.saturating_sub(oldest.t_ms);
        let velocity = if dt_ms == 0 {
            f32::INFINITY
        } else {
            dx.abs() / (dt_ms as f32 / 1000.0)
        };

        let far = dx.abs() > self.params.distance;
        let fast = velocity > self.params.velocity && dx.abs() > self.params.fast_distance;
        if !(far || fast) {
            return None;
        }

        let dir = if dx > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        };
        debug!(
            "swipe {} (dx={dx:.3}, v={velocity:.2}/s over {} samples)",
            dir.as_str(),
            self.history.len()
        );
        self.history.clear();
        self.cooldown_until_ms = Some(t_ms + self.params.cooldown_ms);
        Some(dir)
    }
}
