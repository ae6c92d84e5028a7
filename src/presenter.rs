use anyhow::Result;
use log::info;
use serde::Serialize;
use std::io::Write;

use crate::controller::Phase;
use crate::features::Edge;
use crate::gestures::HandGesture;
use crate::session::{SessionEvent, Snapshot};

/// Consumer of session output. Called after every tick or request that produced something.
pub trait Presenter {
    fn present(&mut self, now_ms: u64, events: &[SessionEvent], snapshot: &Snapshot) -> Result<()>;
}

pub fn gesture_hint(snapshot: &Snapshot) -> Option<&'static str> {
    match snapshot.gesture {
        Some(HandGesture::ClosedFist) => Some("Zoom In - Move hand to rotate"),
        Some(HandGesture::OpenPalm) => Some("Navigate - Move hand to explore"),
        Some(HandGesture::Victory) => Some("Photo Mode - Swipe to navigate"),
        Some(_) => None,
        None if snapshot.is_tracking && snapshot.hand_in_frame => {
            Some("Close fist to reveal photos")
        }
        None => None,
    }
}

pub fn edge_hint(edge: Edge) -> &'static str {
    match edge {
        Edge::Left => "Hand moving out left - Move right",
        Edge::Right => "Hand moving out right - Move left",
        Edge::Top => "Hand moving out top - Move down",
        Edge::Bottom => "Hand moving out bottom - Move up",
    }
}

/// Camera and hand-presence warning, in display priority order.
pub fn status_hint(snapshot: &Snapshot) -> Option<&'static str> {
    if !snapshot.phase.is_open() {
        return None;
    }
    if !snapshot.is_tracking {
        return Some("Loading camera...");
    }
    if !snapshot.hand_in_frame {
        return Some("Hand not detected - Move hand into camera view");
    }
    snapshot.edge_warning.map(edge_hint)
}

/// Every line of text currently on screen.
pub fn hints(snapshot: &Snapshot) -> Vec<&'static str> {
    let mut v = Vec::new();
    if snapshot.phase == Phase::Welcome {
        v.push("Galaxy Mode - Allow camera access to begin");
    }
    v.extend(status_hint(snapshot));
    v.extend(gesture_hint(snapshot));
    if snapshot.phase == Phase::DetailView {
        v.push("Swipe left/right to navigate");
    }
    v
}

/// Logs events and on-screen hints whenever they change.
#[derive(Debug, Default)]
pub struct LogPresenter {
    last_hints: Vec<&'static str>,
}

impl Presenter for LogPresenter {
    fn present(&mut self, now_ms: u64, events: &[SessionEvent], snapshot: &Snapshot) -> Result<()> {
        for e in events {
            match e {
                SessionEvent::Phase { from, to } => {
                    info!("[{now_ms}] {} -> {}", from.as_str(), to.as_str())
                }
                SessionEvent::Selected { id, counter, .. } => {
                    info!("[{now_ms}] photo {id} ({counter})")
                }
                SessionEvent::Swipe { direction } => info!("[{now_ms}] swipe {}", direction.as_str()),
                SessionEvent::TrackingFailed { error } => info!("[{now_ms}] tracking failed: {error}"),
                // reflected in the hints
                _ => {}
            }
        }
        let hints = hints(snapshot);
        if hints != self.last_hints {
            info!("[{now_ms}] {}", hints.join(" | "));
            self.last_hints = hints;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Line<'a> {
    t: u64,
    events: &'a [SessionEvent],
    snapshot: &'a Snapshot,
}

/// One JSON object per update: `{"t", "events", "snapshot"}`. While tracking every frame is an
/// update; otherwise only calls carrying events are written.
pub struct JsonPresenter<W: Write> {
    out: W,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn present(&mut self, now_ms: u64, events: &[SessionEvent], snapshot: &Snapshot) -> Result<()> {
        if events.is_empty() && !snapshot.is_tracking {
            return Ok(());
        }
        let line = Line {
            t: now_ms,
            events,
            snapshot,
        };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;
    use crate::controller::Key;
    use crate::photos::{Photo, PhotoCollection};
    use crate::session::Session;
    use crate::landmarks::ReplayFactory;

    fn snapshot_in(phase_steps: usize) -> Snapshot {
        let photos = PhotoCollection::from_posts(vec![Photo::new("a", "u")]);
        let factory = ReplayFactory {
            path: "/nonexistent/recording.jsonl".into(),
        };
        let mut s = Session::new(photos, Box::new(factory), &Profile::default());
        if phase_steps > 0 {
            s.open();
        }
        if phase_steps > 1 {
            s.begin(0);
        }
        s.snapshot()
    }

    #[test]
    fn welcome_and_failed_camera_hints() {
        let snap = snapshot_in(1);
        assert_eq!(hints(&snap), vec!["Galaxy Mode - Allow camera access to begin"]);
        // the recording is missing, so the camera never comes up
        let snap = snapshot_in(2);
        assert_eq!(snap.phase, Phase::Welcome);
        assert!(snap.tracking_error.is_some());
        assert!(hints(&snapshot_in(0)).is_empty());
    }

    #[test]
    fn gesture_and_status_hints() {
        let mut snap = snapshot_in(1);
        snap.phase = Phase::Browsing;
        assert_eq!(status_hint(&snap), Some("Loading camera..."));

        snap.is_tracking = true;
        assert_eq!(
            status_hint(&snap),
            Some("Hand not detected - Move hand into camera view")
        );
        assert_eq!(gesture_hint(&snap), None);

        snap.hand_in_frame = true;
        assert_eq!(gesture_hint(&snap), Some("Close fist to reveal photos"));
        snap.edge_warning = Some(Edge::Right);
        assert_eq!(status_hint(&snap), Some("Hand moving out right - Move left"));

        snap.gesture = Some(HandGesture::Victory);
        snap.phase = Phase::DetailView;
        assert_eq!(hints(&snap), vec![
            "Hand moving out right - Move left",
            "Photo Mode - Swipe to navigate",
            "Swipe left/right to navigate",
        ]);
        snap.gesture = Some(HandGesture::ThumbUp);
        assert_eq!(gesture_hint(&snap), None);
    }

    #[test]
    fn json_lines_only_for_updates_when_idle() {
        let photos = PhotoCollection::from_posts(vec![Photo::new("a", "u")]);
        let factory = ReplayFactory {
            path: "/nonexistent/recording.jsonl".into(),
        };
        let mut s = Session::new(photos, Box::new(factory), &Profile::default());
        let mut p = JsonPresenter::new(Vec::new());

        let events = s.open();
        p.present(5, &events, &s.snapshot()).unwrap();
        p.present(6, &[], &s.snapshot()).unwrap();
        let events = s.key(Key::Escape);
        p.present(7, &events, &s.snapshot()).unwrap();

        let out = String::from_utf8(p.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["t"], 5);
        assert_eq!(lines[0]["events"][0]["event"], "phase");
        assert_eq!(lines[0]["events"][0]["to"], "welcome");
        assert_eq!(lines[1]["snapshot"]["phase"], "closed");
    }

    #[test]
    fn json_lines_every_frame_while_tracking() {
        let mut snap = snapshot_in(1);
        snap.phase = Phase::Browsing;
        snap.is_tracking = true;
        let mut p = JsonPresenter::new(Vec::new());
        for t in [0, 33, 66] {
            snap.hand_position = (t as f32 / 100.0, 0.5);
            p.present(t, &[], &snap).unwrap();
        }

        let out = String::from_utf8(p.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["t"], 66);
        assert_eq!(lines[2]["events"], serde_json::json!([]));
        let x = lines[1]["snapshot"]["hand_position"][0].as_f64().unwrap();
        assert!((x - 0.33).abs() < 1e-6, "{x}");
    }

    #[test]
    fn log_presenter_tracks_hint_changes() {
        let mut p = LogPresenter::default();
        let snap = snapshot_in(1);
        p.present(0, &[], &snap).unwrap();
        assert_eq!(p.last_hints, hints(&snap));
    }
}
