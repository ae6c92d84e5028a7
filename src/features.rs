use serde::Serialize;

use crate::landmarks::{
    INDEX_PIP, INDEX_TIP, LandmarkFrame, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP, PINKY_TIP, RING_PIP,
    RING_TIP, THUMB_MCP, THUMB_TIP, WRIST,
};

/// Horizontal thumb tip ↔ knuckle distance above which the thumb counts as extended.
pub const DEFAULT_THUMB_SPREAD: f32 = 0.05;

/// Fraction of the frame from each border that raises an edge warning.
pub const DEFAULT_EDGE_MARGIN: f32 = 0.12;

/// (tip, proximal joint) pairs for the four non-thumb fingers.
const FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// Border of the (mirrored) display the hand is about to leave through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

pub fn count_extended_fingers(frame: &LandmarkFrame) -> u8 {
    count_extended_fingers_with(frame, DEFAULT_THUMB_SPREAD)
}

/// Number of extended fingers in [0,5]. A finger is extended when its tip is above (smaller y)
/// its proximal joint; the thumb when it sticks out sideways by more than `thumb_spread`.
pub fn count_extended_fingers_with(frame: &LandmarkFrame, thumb_spread: f32) -> u8 {
    let Some(p) = frame.points() else {
        return 0;
    };

    let thumb = (p[THUMB_TIP].x - p[THUMB_MCP].x).abs() > thumb_spread;
    let others = FINGERS
        .iter()
        .filter(|&&(tip, pip)| p[tip].y < p[pip].y)
        .count();
    others as u8 + thumb as u8
}

/// Index and middle up, ring and pinky down; the thumb is ignored.
pub fn is_victory_pose(frame: &LandmarkFrame) -> bool {
    let Some(p) = frame.points() else {
        return false;
    };

    let index_up = p[INDEX_TIP].y < p[INDEX_PIP].y;
    let middle_up = p[MIDDLE_TIP].y < p[MIDDLE_PIP].y;
    let ring_down = p[RING_TIP].y > p[RING_PIP].y;
    let pinky_down = p[PINKY_TIP].y > p[PINKY_PIP].y;

    index_up && middle_up && ring_down && pinky_down
}

/// Edge the wrist is within `margin` of. Raw x near 0 is the right side of the mirrored display.
/// Checked left, right, top, bottom; the first match wins.
pub fn edge_proximity(frame: &LandmarkFrame, margin: f32) -> Option<Edge> {
    let wrist = frame.points()?[WRIST];

    if wrist.x < margin {
        Some(Edge::Right)
    } else if wrist.x > 1.0 - margin {
        Some(Edge::Left)
    } else if wrist.y < margin {
        Some(Edge::Top)
    } else if wrist.y > 1.0 - margin {
        Some(Edge::Bottom)
    } else {
        None
    }
}

/// Mirrored wrist position in display space.
pub fn hand_position(frame: &LandmarkFrame) -> Option<(f32, f32)> {
    let wrist = frame.points()?[WRIST];
    Some((1.0 - wrist.x, wrist.y))
}

/// Mirrored horizontal position used for swipes: the midpoint of the index and middle tips,
/// which is steadier than the wrist while the Victory pose is held.
pub fn swipe_anchor_x(frame: &LandmarkFrame) -> Option<f32> {
    let p = frame.points()?;
    Some(1.0 - (p[INDEX_TIP].x + p[MIDDLE_TIP].x) / 2.0)
}
