use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{Profile, Thresholds, effective_delegates};
use crate::controller::{BrowsingState, Controller, ControllerEvent, Key, Phase};
use crate::features::Edge;
use crate::gestures::{HandGesture, SwipeDirection};
use crate::landmarks::{
    Delegate, LandmarkSource, Recognition, SourceFactory, create_landmark_source,
};
use crate::photos::{Photo, PhotoCollection};
use crate::scene::{CameraRig, ParticleField, PhotoCard, Scene, Vec3};
use crate::tracker::{FrameOutcome, Tracker};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Phase {
        from: Phase,
        to: Phase,
    },
    Selected {
        index: usize,
        id: String,
        counter: String,
    },
    Swipe {
        direction: SwipeDirection,
    },
    Gesture {
        gesture: Option<HandGesture>,
    },
    HandInFrame {
        in_frame: bool,
    },
    EdgeWarning {
        edge: Option<Edge>,
    },
    TrackingFailed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub is_tracking: bool,
    pub tracking_error: Option<String>,
    pub gesture: Option<HandGesture>,
    pub hand_position: (f32, f32),
    pub hand_in_frame: bool,
    pub edge_warning: Option<Edge>,
    pub finger_count: u8,
    pub swipe: Option<SwipeDirection>,
    pub browsing: BrowsingState,
    pub selected_photo: Option<Photo>,
    pub counter: Option<String>,
    pub photo_count: usize,
    pub camera: CameraRig,
    pub camera_position: Vec3,
    pub particles: ParticleField,
    pub cards: Vec<PhotoCard>,
    pub ambient: f32,
    pub bloom: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub source: Option<String>,
    pub delegate: Option<Delegate>,
    pub frames_processed: u64,
    /// Processed frames per second, measured over the last full second.
    pub fps: f32,
    pub has_results: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct FrameStats {
    frames: u64,
    window_start_ms: Option<u64>,
    window_frames: u32,
    fps: f32,
    has_results: bool,
    last_error: Option<String>,
}

impl FrameStats {
    fn record(&mut self, now_ms: u64, has_hand: bool) {
        self.frames += 1;
        self.has_results = has_hand;
        self.window_frames += 1;
        let start = *self.window_start_ms.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(start);
        if elapsed >= 1000 {
            self.fps = self.window_frames as f32 * 1000.0 / elapsed as f32;
            self.window_start_ms = Some(now_ms);
            self.window_frames = 0;
        }
    }
}

pub struct Session {
    th: Thresholds,
    delegates: Vec<Delegate>,
    factory: Box<dyn SourceFactory>,
    photos: PhotoCollection,
    source: Option<Box<dyn LandmarkSource>>,
    delegate: Option<Delegate>,
    tracker: Tracker,
    controller: Controller,
    scene: Scene,
    swipe_pulse: Option<(SwipeDirection, u64)>,
    last_tick_ms: Option<u64>,
    tracking_error: Option<String>,
    stats: FrameStats,
}

impl Session {
    pub fn new(photos: PhotoCollection, factory: Box<dyn SourceFactory>, profile: &Profile) -> Self {
        let th = profile.thresholds.clone();
        let mut controller = Controller::new(photos.len());
        controller.set_exit_delay(th.detail_exit_ms);
        Self {
            delegates: effective_delegates(&profile.tracking),
            factory,
            source: None,
            delegate: None,
            tracker: Tracker::new(th.clone()),
            controller,
            scene: Scene::new(photos.len()),
            photos,
            swipe_pulse: None,
            last_tick_ms: None,
            tracking_error: None,
            stats: FrameStats::default(),
            th,
        }
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn photos(&self) -> &PhotoCollection {
        &self.photos
    }

    pub fn is_tracking(&self) -> bool {
        self.source.is_some() && self.controller.phase().is_open()
    }

    /// True once an open session's source has run out of frames (recordings only).
    pub fn source_finished(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_finished())
    }

    /// Applies a reloaded profile. A running source keeps its delegate.
    pub fn apply_profile(&mut self, profile: &Profile) {
        self.th = profile.thresholds.clone();
        self.delegates = effective_delegates(&profile.tracking);
        self.tracker.set_thresholds(self.th.clone());
        self.controller.set_exit_delay(self.th.detail_exit_ms);
        debug!("session thresholds updated");
    }

    /// Swaps in a reloaded collection. The selection is clamped to the new size.
    pub fn set_photos(&mut self, photos: PhotoCollection) -> Vec<SessionEvent> {
        self.scene.set_photo_count(photos.len());
        self.photos = photos;
        let events = self.controller.set_photo_count(self.photos.len());
        self.convert(events)
    }

    pub fn open(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.open();
        self.convert(events)
    }

    /// Consent given on the welcome screen: brings up the landmark source and starts tracking.
    /// On failure the session stays in `Welcome` with the error exposed.
    pub fn begin(&mut self, now_ms: u64) -> Vec<SessionEvent> {
        if self.controller.phase() != Phase::Welcome {
            debug!("begin ignored while {}", self.controller.phase().as_str());
            return Vec::new();
        }

        match create_landmark_source(self.factory.as_ref(), &self.delegates) {
            Ok((source, delegate)) => {
                self.source = Some(source);
                self.delegate = Some(delegate);
                self.tracking_error = None;
                self.tracker.reset();
                self.stats = FrameStats::default();
                self.last_tick_ms = Some(now_ms);
                let events = self.controller.begin();
                self.convert(events)
            }
            Err(e) => {
                warn!("tracking unavailable: {e}");
                let error = e.to_string();
                self.tracking_error = Some(error.clone());
                self.stats.last_error = Some(error.clone());
                vec![SessionEvent::TrackingFailed { error }]
            }
        }
    }

    pub fn close(&mut self) -> Vec<SessionEvent> {
        self.teardown();
        let events = self.controller.close();
        self.convert(events)
    }

    pub fn key(&mut self, key: Key) -> Vec<SessionEvent> {
        let events = self.controller.key(key);
        self.convert(events)
    }

    pub fn next(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.next();
        self.convert(events)
    }

    pub fn prev(&mut self) -> Vec<SessionEvent> {
        let events = self.controller.prev();
        self.convert(events)
    }

    pub fn select_photo(&mut self, id: &str) -> Vec<SessionEvent> {
        match self.photos.index_of(id) {
            Some(index) => {
                let events = self.controller.select(index);
                self.convert(events)
            }
            None => {
                warn!("select: unknown photo id '{id}'");
                Vec::new()
            }
        }
    }

    pub fn hover_photo(&mut self, id: Option<&str>) {
        let index = id.and_then(|id| self.photos.index_of(id));
        self.scene.set_hovered(index);
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<SessionEvent> {
        let dt = self
            .last_tick_ms
            .map(|t| now_ms.saturating_sub(t) as f32 / 1000.0)
            .unwrap_or(0.0);
        self.last_tick_ms = Some(now_ms);

        let mut events = Vec::new();
        if self.is_tracking() {
            if let Some(outcome) = self.track(now_ms, &mut events) {
                let ctl = self.controller.on_gesture(outcome.gesture, now_ms);
                events.extend(self.convert(ctl));
                if let Some(direction) = outcome.swipe {
                    self.swipe_pulse = Some((direction, now_ms + self.th.swipe_pulse_ms));
                    events.push(SessionEvent::Swipe { direction });
                    let ctl = self.controller.on_swipe(direction);
                    events.extend(self.convert(ctl));
                }
            }
        }

        let ctl = self.controller.poll(now_ms);
        events.extend(self.convert(ctl));

        if self.swipe_pulse.is_some_and(|(_, until)| now_ms >= until) {
            self.swipe_pulse = None;
        }

        let state = self.tracker.state();
        let selected = self.controller.browsing().selected_index;
        self.scene
            .update(state.gesture, state.hand_position, selected, dt);
        events
    }

    /// Runs the source once; `None` when no new video frame was available.
    fn track(&mut self, now_ms: u64, events: &mut Vec<SessionEvent>) -> Option<FrameOutcome> {
        let result = self.source.as_mut()?.recognize(now_ms);

        let before = self.tracker.state().clone();
        let outcome = match result {
            Ok(Recognition::NoNewFrame) => return None,
            Ok(Recognition::NoHand) => {
                self.stats.record(now_ms, false);
                self.tracker.on_no_hand()
            }
            Ok(Recognition::Hand(frame)) => {
                self.stats.record(now_ms, true);
                self.tracker.on_hand(&frame)
            }
            Err(e) => {
                warn!("frame at {now_ms} ms: {e}");
                self.stats.last_error = Some(e.to_string());
                self.stats.record(now_ms, false);
                self.tracker.on_no_hand()
            }
        };

        let after = self.tracker.state();
        if after.gesture != before.gesture {
            events.push(SessionEvent::Gesture {
                gesture: after.gesture,
            });
        }
        if after.hand_in_frame != before.hand_in_frame {
            events.push(SessionEvent::HandInFrame {
                in_frame: after.hand_in_frame,
            });
        }
        if after.edge_warning != before.edge_warning {
            events.push(SessionEvent::EdgeWarning {
                edge: after.edge_warning,
            });
        }
        Some(outcome)
    }

    /// Releases the source and resets tracking. Safe to call repeatedly.
    fn teardown(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            info!("landmark source '{}' released", source.name());
        }
        self.delegate = None;
        self.tracking_error = None;
        self.tracker.reset();
        self.swipe_pulse = None;
        self.scene.set_hovered(None);
    }

    fn convert(&mut self, events: Vec<ControllerEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            match event {
                ControllerEvent::PhaseChanged { from, to } => {
                    if from.is_open() && to == Phase::Closed {
                        self.teardown();
                    }
                    out.push(SessionEvent::Phase { from, to });
                }
                ControllerEvent::Selected { index } => {
                    if let (Some(photo), Some(counter)) =
                        (self.photos.get(index), self.photos.counter(index))
                    {
                        out.push(SessionEvent::Selected {
                            index,
                            id: photo.id.clone(),
                            counter,
                        });
                    }
                }
            }
        }
        out
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.tracker.state();
        let browsing = self.controller.browsing();
        let shown = browsing
            .selected_index
            .filter(|_| browsing.is_detail_view);
        Snapshot {
            phase: self.controller.phase(),
            is_tracking: self.is_tracking(),
            tracking_error: self.tracking_error.clone(),
            gesture: state.gesture,
            hand_position: state.hand_position,
            hand_in_frame: state.hand_in_frame,
            edge_warning: state.edge_warning,
            finger_count: state.finger_count,
            swipe: self.swipe_pulse.map(|(d, _)| d),
            browsing,
            selected_photo: shown.and_then(|i| self.photos.get(i)).cloned(),
            counter: shown.and_then(|i| self.photos.counter(i)),
            photo_count: self.photos.len(),
            camera: self.scene.camera,
            camera_position: self.scene.camera.position(),
            particles: self.scene.particles,
            cards: self.scene.cards.clone(),
            ambient: self.scene.ambient,
            bloom: self.scene.bloom,
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            source: self.source.as_ref().map(|s| s.name().to_string()),
            delegate: self.delegate,
            frames_processed: self.stats.frames,
            fps: self.stats.fps,
            has_results: self.stats.has_results,
            last_error: self.stats.last_error.clone(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
