use log::debug;
use serde::Serialize;

use crate::config::Thresholds;
use crate::features::{self, Edge};
use crate::gestures::{HandGesture, SwipeDetector, SwipeDirection, SwipeParams};
use crate::landmarks::LandmarkFrame;

/// Tracking state of one session. Mutated only by [`Tracker`]'s per-frame step.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingState {
    pub gesture: Option<HandGesture>,
    /// Mirrored wrist position.
    pub hand_position: (f32, f32),
    pub hand_in_frame: bool,
    pub edge_warning: Option<Edge>,
    pub finger_count: u8,
    pub no_hand_frames: u32,
    #[serde(skip)]
    pub swipe: SwipeDetector,
}

impl TrackingState {
    fn new(params: SwipeParams) -> Self {
        Self {
            gesture: None,
            hand_position: (0.5, 0.5),
            hand_in_frame: false,
            edge_warning: None,
            finger_count: 0,
            no_hand_frames: 0,
            swipe: SwipeDetector::new(params),
        }
    }
}

/// Result of one processed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    pub gesture: Option<HandGesture>,
    pub swipe: Option<SwipeDirection>,
}

#[derive(Debug)]
pub struct Tracker {
    th: Thresholds,
    state: TrackingState,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl Tracker {
    pub fn new(th: Thresholds) -> Self {
        let state = TrackingState::new(SwipeParams::from(&th));
        Self { th, state }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn set_thresholds(&mut self, th: Thresholds) {
        self.state.swipe.set_params(SwipeParams::from(&th));
        self.th = th;
    }

    /// Back to the initial values (tracking disabled or re-enabled).
    pub fn reset(&mut self) {
        self.state = TrackingState::new(SwipeParams::from(&self.th));
    }

    /// Processes a frame with a detected hand.
    pub fn on_hand(&mut self, frame: &LandmarkFrame) -> FrameOutcome {
        let s = &mut self.state;
        s.no_hand_frames = 0;
        s.hand_in_frame = true;
        s.edge_warning = features::edge_proximity(frame, self.th.edge_margin);
        if let Some(pos) = features::hand_position(frame) {
            s.hand_position = pos;
        }
        s.finger_count = features::count_extended_fingers_with(frame, self.th.thumb_spread);

        // the rule-based Victory check beats the classifier's own label
        let victory = features::is_victory_pose(frame);
        s.gesture = if victory {
            Some(HandGesture::Victory)
        } else {
            frame
                .top_gesture()
                .filter(|c| c.score > self.th.min_confidence)
                .and_then(|c| HandGesture::from_category(&c.category_name))
        };

        let swipe = match features::swipe_anchor_x(frame) {
            Some(x) => s.swipe.update(x, frame.timestamp_ms, victory),
            None => s.swipe.update(0.0, frame.timestamp_ms, false),
        };

        FrameOutcome {
            gesture: s.gesture,
            swipe,
        }
    }

    /// Processes a frame without a hand, or one whose recognition failed.
    pub fn on_no_hand(&mut self) -> FrameOutcome {
        let s = &mut self.state;
        s.no_hand_frames = s.no_hand_frames.saturating_add(1);
        s.finger_count = 0;
        s.swipe.clear();

        if s.no_hand_frames > self.th.no_hand_grace_frames && s.hand_in_frame {
            debug!("hand lost after {} empty frames", s.no_hand_frames);
            s.hand_in_frame = false;
            s.edge_warning = None;
            s.gesture = None;
        }

        FrameOutcome {
            gesture: s.gesture,
            swipe: None,
        }
    }

    pub fn update(&mut self, frame: Option<&LandmarkFrame>) -> FrameOutcome {
        match frame {
            Some(f) => self.on_hand(f),
            None => self.on_no_hand(),
        }
    }
}
