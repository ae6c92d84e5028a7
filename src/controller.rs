//! Photo-browsing state machine driven by stabilized gestures, swipes, keys and clicks.
//!
//! ```text
//! Closed --open--> Welcome --begin--> Browsing <--victory / release+delay--> DetailView
//!    ^               |                   |                                   |
//!    +---- close / Escape (outside DetailView) ------------------------------+
//! ```
//!
//! Entering and leaving the detail view follows *changes* of the stabilized gesture: a fresh
//! Victory enters, releasing it arms a delayed exit which a renewed Victory cancels.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::gestures::{HandGesture, SwipeDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Closed,
    /// Camera prompt shown; nothing is tracked yet.
    Welcome,
    Browsing,
    DetailView,
}

impl Phase {
    /// Browsing or detail view; the only phases in which hands are tracked.
    pub fn is_open(&self) -> bool {
        matches!(self, Phase::Browsing | Phase::DetailView)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Closed => "closed",
            Phase::Welcome => "welcome",
            Phase::Browsing => "browsing",
            Phase::DetailView => "detail_view",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrowsingState {
    pub selected_index: Option<usize>,
    pub is_detail_view: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Escape" | "Esc" | "escape" | "esc" => Some(Key::Escape),
            "ArrowLeft" | "Left" | "left" => Some(Key::ArrowLeft),
            "ArrowRight" | "Right" | "right" => Some(Key::ArrowRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    PhaseChanged { from: Phase, to: Phase },
    Selected { index: usize },
}

#[derive(Debug)]
pub struct Controller {
    phase: Phase,
    selected: Option<usize>,
    photo_count: usize,
    last_gesture: Option<HandGesture>,
    pending_exit_ms: Option<u64>,
    exit_delay_ms: u64,
}

impl Controller {
    pub const DEFAULT_EXIT_DELAY_MS: u64 = 500;

    pub fn new(photo_count: usize) -> Self {
        Self {
            phase: Phase::Closed,
            selected: None,
            photo_count,
            last_gesture: None,
            pending_exit_ms: None,
            exit_delay_ms: Self::DEFAULT_EXIT_DELAY_MS,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn browsing(&self) -> BrowsingState {
        BrowsingState {
            selected_index: self.selected,
            is_detail_view: self.phase == Phase::DetailView,
        }
    }

    pub fn photo_count(&self) -> usize {
        self.photo_count
    }

    /// Time at which a released Victory pose will close the detail view.
    pub fn pending_exit(&self) -> Option<u64> {
        self.pending_exit_ms
    }

    pub fn set_exit_delay(&mut self, ms: u64) {
        self.exit_delay_ms = ms;
    }

    /// Adopts a new collection size, keeping the selection in range.
    pub fn set_photo_count(&mut self, count: usize) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        self.photo_count = count;
        match self.selected {
            Some(_) if count == 0 => {
                self.selected = None;
                if self.phase == Phase::DetailView {
                    self.pending_exit_ms = None;
                    self.transition(Phase::Browsing, &mut events);
                }
            }
            Some(i) if i >= count => self.select_index(count - 1, &mut events),
            _ => {}
        }
        events
    }

    pub fn open(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::Closed {
            self.transition(Phase::Welcome, &mut events);
        }
        events
    }

    /// User consented to the camera; the caller has tracking running.
    pub fn begin(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if self.phase == Phase::Welcome {
            self.last_gesture = None;
            self.transition(Phase::Browsing, &mut events);
        }
        events
    }

    pub fn close(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if self.phase != Phase::Closed {
            self.transition(Phase::Closed, &mut events);
        }
        self.selected = None;
        self.pending_exit_ms = None;
        self.last_gesture = None;
        events
    }

    pub fn key(&mut self, key: Key) -> Vec<ControllerEvent> {
        match key {
            Key::Escape => match self.phase {
                Phase::DetailView => {
                    let mut events = Vec::new();
                    self.pending_exit_ms = None;
                    self.transition(Phase::Browsing, &mut events);
                    events
                }
                Phase::Welcome | Phase::Browsing => self.close(),
                Phase::Closed => Vec::new(),
            },
            Key::ArrowRight => self.next(),
            Key::ArrowLeft => self.prev(),
        }
    }

    pub fn next(&mut self) -> Vec<ControllerEvent> {
        self.step(true)
    }

    pub fn prev(&mut self) -> Vec<ControllerEvent> {
        self.step(false)
    }

    pub fn on_swipe(&mut self, dir: SwipeDirection) -> Vec<ControllerEvent> {
        match dir {
            SwipeDirection::Right => self.step(true),
            SwipeDirection::Left => self.step(false),
        }
    }

    /// Explicit photo choice; opens the detail view regardless of the current gesture.
    pub fn select(&mut self, index: usize) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if !self.phase.is_open() {
            debug!("ignoring photo selection while {}", self.phase.as_str());
            return events;
        }
        if index >= self.photo_count {
            warn!(
                "photo index {index} out of range ({} photos)",
                self.photo_count
            );
            return events;
        }
        self.pending_exit_ms = None;
        self.select_index(index, &mut events);
        if self.phase != Phase::DetailView {
            self.transition(Phase::DetailView, &mut events);
        }
        events
    }

    /// Feeds the stabilized gesture of the latest frame.
    pub fn on_gesture(&mut self, gesture: Option<HandGesture>, now_ms: u64) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        let was_victory = self.last_gesture == Some(HandGesture::Victory);
        let is_victory = gesture == Some(HandGesture::Victory);
        self.last_gesture = gesture;

        if !self.phase.is_open() {
            return events;
        }

        match (was_victory, is_victory) {
            (false, true) => {
                if self.pending_exit_ms.take().is_some() {
                    debug!("victory back, detail view exit cancelled");
                }
                if self.phase == Phase::Browsing && self.photo_count > 0 {
                    if self.selected.is_none() {
                        self.select_index(0, &mut events);
                    }
                    self.transition(Phase::DetailView, &mut events);
                }
            }
            (true, false) => {
                if self.phase == Phase::DetailView {
                    let at = now_ms + self.exit_delay_ms;
                    debug!("victory released, detail view closes at {at} ms");
                    self.pending_exit_ms = Some(at);
                }
            }
            _ => {}
        }
        events
    }

    /// Fires the delayed detail-view exit once due.
    pub fn poll(&mut self, now_ms: u64) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if let Some(at) = self.pending_exit_ms {
            if now_ms >= at {
                self.pending_exit_ms = None;
                if self.phase == Phase::DetailView {
                    self.transition(Phase::Browsing, &mut events);
                }
            }
        }
        events
    }

    fn step(&mut self, forward: bool) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        let n = self.photo_count;
        if self.phase != Phase::DetailView || n == 0 {
            return events;
        }
        let index = match (self.selected, forward) {
            (None, true) => 0,
            (None, false) => n - 1,
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
        };
        self.select_index(index, &mut events);
        events
    }

    fn select_index(&mut self, index: usize, events: &mut Vec<ControllerEvent>) {
        if self.selected != Some(index) {
            self.selected = Some(index);
            events.push(ControllerEvent::Selected { index });
        }
    }

    fn transition(&mut self, to: Phase, events: &mut Vec<ControllerEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        info!("{} -> {}", from.as_str(), to.as_str());
        events.push(ControllerEvent::PhaseChanged { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V: Option<HandGesture> = Some(HandGesture::Victory);
    const FIST: Option<HandGesture> = Some(HandGesture::ClosedFist);

    fn browsing(n: usize) -> Controller {
        let mut c = Controller::new(n);
        c.open();
        c.begin();
        assert_eq!(c.phase(), Phase::Browsing);
        c
    }

    fn detail(n: usize) -> Controller {
        let mut c = browsing(n);
        c.on_gesture(V, 0);
        assert_eq!(c.phase(), Phase::DetailView);
        c
    }

    #[test]
    fn welcome_gates_tracking() {
        let mut c = Controller::new(3);
        assert_eq!(c.open(), vec![ControllerEvent::PhaseChanged {
            from: Phase::Closed,
            to: Phase::Welcome,
        }]);
        // gestures before consent do nothing
        c.on_gesture(V, 0);
        assert_eq!(c.phase(), Phase::Welcome);
        c.begin();
        assert_eq!(c.phase(), Phase::Browsing);
    }

    #[test]
    fn victory_enters_detail_view_at_first_photo() {
        let mut c = browsing(3);
        let events = c.on_gesture(V, 100);
        assert_eq!(events, vec![
            ControllerEvent::Selected { index: 0 },
            ControllerEvent::PhaseChanged {
                from: Phase::Browsing,
                to: Phase::DetailView,
            },
        ]);
        assert_eq!(c.browsing(), BrowsingState {
            selected_index: Some(0),
            is_detail_view: true,
        });
    }

    #[test]
    fn victory_keeps_previous_selection() {
        let mut c = detail(5);
        c.next();
        c.next();
        c.key(Key::Escape);
        c.on_gesture(None, 10);
        c.on_gesture(V, 20);
        assert_eq!(c.browsing().selected_index, Some(2));
        assert!(c.browsing().is_detail_view);
    }

    #[test]
    fn empty_collection_never_enters_detail_view() {
        let mut c = browsing(0);
        for t in 0..5 {
            c.on_gesture(V, t * 33);
            c.on_gesture(None, t * 33 + 10);
        }
        c.on_gesture(V, 500);
        assert_eq!(c.phase(), Phase::Browsing);
        assert!(c.select(0).is_empty());
        assert!(c.next().is_empty());
        assert_eq!(c.phase(), Phase::Browsing);
    }

    #[test]
    fn release_exits_after_delay() {
        let mut c = detail(3);
        c.on_gesture(None, 1000);
        assert_eq!(c.pending_exit(), Some(1500));
        c.poll(1499);
        assert_eq!(c.phase(), Phase::DetailView);
        c.poll(1500);
        assert_eq!(c.phase(), Phase::Browsing);
        // selection survives leaving the detail view
        assert_eq!(c.browsing().selected_index, Some(0));
    }

    #[test]
    fn returning_victory_cancels_exit() {
        let mut c = detail(3);
        c.on_gesture(FIST, 0);
        c.poll(200);
        c.on_gesture(V, 400);
        c.poll(400);
        assert_eq!(c.pending_exit(), None);
        c.poll(600);
        assert_eq!(c.phase(), Phase::DetailView);
    }

    #[test]
    fn wrap_around_stays_in_range() {
        let mut c = detail(3);
        c.prev();
        assert_eq!(c.browsing().selected_index, Some(2));
        c.next();
        assert_eq!(c.browsing().selected_index, Some(0));

        let ops = [true, false, false, false, true, false, false, true, true, true, true];
        for n in 1..6 {
            let mut c = detail(n);
            for &fwd in ops.iter().cycle().take(50) {
                c.step(fwd);
                let i = c.browsing().selected_index.unwrap();
                assert!(i < n);
            }
        }
    }

    #[test]
    fn swipes_keys_and_buttons_share_arithmetic() {
        let mut a = detail(4);
        let mut b = detail(4);
        let mut k = detail(4);
        a.on_swipe(SwipeDirection::Left);
        b.prev();
        k.key(Key::ArrowLeft);
        assert_eq!(a.browsing(), b.browsing());
        assert_eq!(b.browsing(), k.browsing());
        assert_eq!(a.browsing().selected_index, Some(3));

        a.on_swipe(SwipeDirection::Right);
        k.key(Key::ArrowRight);
        assert_eq!(a.browsing().selected_index, Some(0));
        assert_eq!(k.browsing().selected_index, Some(0));
    }

    #[test]
    fn navigation_is_ignored_outside_detail_view() {
        let mut c = browsing(3);
        assert!(c.on_swipe(SwipeDirection::Right).is_empty());
        assert!(c.key(Key::ArrowRight).is_empty());
        assert_eq!(c.browsing().selected_index, None);
    }

    #[test]
    fn escape_leaves_detail_view_then_closes() {
        let mut c = detail(3);
        c.on_gesture(None, 10);
        c.key(Key::Escape);
        assert_eq!(c.phase(), Phase::Browsing);
        assert_eq!(c.pending_exit(), None);
        c.key(Key::Escape);
        assert_eq!(c.phase(), Phase::Closed);
        assert_eq!(c.browsing(), BrowsingState::default());
    }

    #[test]
    fn escape_on_welcome_closes() {
        let mut c = Controller::new(3);
        c.open();
        c.key(Key::Escape);
        assert_eq!(c.phase(), Phase::Closed);
    }

    #[test]
    fn held_victory_after_escape_does_not_reenter() {
        let mut c = detail(3);
        c.key(Key::Escape);
        c.on_gesture(V, 33);
        c.on_gesture(V, 66);
        assert_eq!(c.phase(), Phase::Browsing);
    }

    #[test]
    fn explicit_selection_forces_detail_view() {
        let mut c = browsing(4);
        c.on_gesture(FIST, 0);
        let events = c.select(2);
        assert_eq!(events.len(), 2);
        assert_eq!(c.browsing(), BrowsingState {
            selected_index: Some(2),
            is_detail_view: true,
        });
        // no Victory was released, so it stays open
        c.on_gesture(FIST, 100);
        c.poll(5000);
        assert_eq!(c.phase(), Phase::DetailView);
        assert!(c.select(9).is_empty());
    }

    #[test]
    fn close_resets_and_reopens_at_welcome() {
        let mut c = detail(3);
        c.next();
        c.on_gesture(None, 10);
        c.close();
        assert_eq!(c.phase(), Phase::Closed);
        assert_eq!(c.browsing(), BrowsingState::default());
        assert_eq!(c.pending_exit(), None);
        c.poll(10_000);
        assert_eq!(c.phase(), Phase::Closed);
        c.open();
        assert_eq!(c.phase(), Phase::Welcome);
    }

    #[test]
    fn shrinking_collection_clamps_selection() {
        let mut c = detail(5);
        c.prev();
        assert_eq!(c.browsing().selected_index, Some(4));
        c.set_photo_count(2);
        assert_eq!(c.browsing().selected_index, Some(1));
        c.set_photo_count(0);
        assert_eq!(c.phase(), Phase::Browsing);
        assert_eq!(c.browsing().selected_index, None);
    }

    #[test]
    fn keys_parse() {
        assert_eq!(Key::parse("Escape"), Some(Key::Escape));
        assert_eq!(Key::parse("ArrowLeft"), Some(Key::ArrowLeft));
        assert_eq!(Key::parse("right"), Some(Key::ArrowRight));
        assert_eq!(Key::parse("Enter"), None);
    }
}
