use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fmt, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::error::SourceError;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One normalized point; `x`/`y` in [0,1] of frame width/height, smaller `y` is higher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category_name: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    pub timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
    pub gestures: Vec<Classification>,
}

impl LandmarkFrame {
    /// Full hand skeleton, or `None` when the detector returned fewer than 21 points.
    pub fn points(&self) -> Option<&[Landmark; LANDMARK_COUNT]> {
        self.landmarks.get(..LANDMARK_COUNT)?.try_into().ok()
    }

    /// Highest-scoring classification; the earliest entry wins a tie.
    pub fn top_gesture(&self) -> Option<&Classification> {
        self.gestures
            .iter()
            .reduce(|a, b| if b.score > a.score { b } else { a })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    /// The video has not advanced since the previous call; nothing to process.
    NoNewFrame,
    NoHand,
    Hand(LandmarkFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    Gpu,
    Cpu,
}

impl Delegate {
    /// Creation order used when a profile leaves it unspecified. Mobile GPUs are the less
    /// reliable backend on Android, so the CPU is tried first there.
    pub fn platform_order() -> &'static [Delegate] {
        #[cfg(target_os = "android")]
        {
            &[Delegate::Cpu, Delegate::Gpu]
        }
        #[cfg(not(target_os = "android"))]
        {
            &[Delegate::Gpu, Delegate::Cpu]
        }
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Delegate::Gpu => "GPU",
            Delegate::Cpu => "CPU",
        })
    }
}

pub trait LandmarkSource {
    fn name(&self) -> &str;

    fn recognize(&mut self, now_ms: u64) -> Result<Recognition, SourceError>;

    fn is_finished(&self) -> bool {
        false
    }

    /// Stops the camera stream and frees model resources. Must be idempotent.
    fn close(&mut self) {}
}

pub trait SourceFactory {
    fn create(&self, delegate: Delegate) -> Result<Box<dyn LandmarkSource>, SourceError>;
}

/// Creates a landmark source trying each delegate in `order` (platform order when empty).
///
/// A camera failure aborts immediately since no other delegate can fix it; model failures fall
/// through to the next delegate.
pub fn create_landmark_source(
    factory: &dyn SourceFactory,
    order: &[Delegate],
) -> Result<(Box<dyn LandmarkSource>, Delegate), SourceError> {
    let order = if order.is_empty() {
        Delegate::platform_order()
    } else {
        order
    };

    let mut tried = Vec::with_capacity(order.len());
    for &delegate in order {
        match factory.create(delegate) {
            Ok(source) => {
                info!("landmark source '{}' ready ({delegate})", source.name());
                return Ok((source, delegate));
            }
            Err(e @ SourceError::CameraUnavailable(_)) => return Err(e),
            Err(e) => {
                warn!("{delegate} delegate failed, trying next: {e}");
                tried.push(format!("{delegate}: {e}"));
            }
        }
    }
    Err(SourceError::NoDelegate {
        tried: tried.join("; "),
    })
}

// --------- recorded sessions ----------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Milliseconds since the start of the recording.
    pub t: u64,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub gestures: Vec<Classification>,
    /// Simulated recognizer failure for this frame.
    #[serde(default)]
    pub error: Option<String>,
}

impl RecordedFrame {
    fn into_recognition(self, origin_ms: u64) -> Result<Recognition, SourceError> {
        if let Some(e) = self.error {
            return Err(SourceError::Recognition(e));
        }
        if self.landmarks.is_empty() {
            return Ok(Recognition::NoHand);
        }
        Ok(Recognition::Hand(LandmarkFrame {
            timestamp_ms: origin_ms + self.t,
            landmarks: self.landmarks,
            gestures: self.gestures,
        }))
    }
}

/// Plays back a recorded session in real time relative to the first `recognize` call.
#[derive(Debug)]
pub struct ReplaySource {
    name: String,
    frames: VecDeque<RecordedFrame>,
    origin_ms: Option<u64>,
    closed: bool,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = fs::File::open(path).map_err(|e| {
            SourceError::CameraUnavailable(format!("recording {}: {e}", path.display()))
        })?;
        let mut src = Self::from_reader(BufReader::new(file))?;
        src.name = format!("replay:{}", path.display());
        Ok(src)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, SourceError> {
        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let frame: RecordedFrame = serde_json::from_str(&line)
                .map_err(|source| SourceError::Record { line: i + 1, source })?;
            frames.push(frame);
        }
        Ok(Self::from_frames(frames))
    }

    pub fn from_frames(mut frames: Vec<RecordedFrame>) -> Self {
        frames.sort_by_key(|f| f.t);
        Self {
            name: "replay".to_string(),
            frames: frames.into(),
            origin_ms: None,
            closed: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&mut self, now_ms: u64) -> Result<Recognition, SourceError> {
        if self.closed {
            return Ok(Recognition::NoNewFrame);
        }
        let origin = *self.origin_ms.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(origin);

        // like a live camera, only the newest due frame is processed
        let mut due = None;
        let mut skipped = 0usize;
        while self.frames.front().is_some_and(|f| f.t <= elapsed) {
            if due.is_some() {
                skipped += 1;
            }
            due = self.frames.pop_front();
        }
        if skipped > 0 {
            debug!("{}: dropped {skipped} stale frame(s)", self.name);
        }

        match due {
            Some(frame) => frame.into_recognition(origin),
            None => Ok(Recognition::NoNewFrame),
        }
    }

    fn is_finished(&self) -> bool {
        self.closed || self.frames.is_empty()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.frames.clear();
            debug!("{}: closed", self.name);
        }
    }
}

/// Opens a recording as the "camera". The delegate has no effect on playback.
#[derive(Debug, Clone)]
pub struct ReplayFactory {
    pub path: PathBuf,
}

impl SourceFactory for ReplayFactory {
    fn create(&self, delegate: Delegate) -> Result<Box<dyn LandmarkSource>, SourceError> {
        debug!("opening {} with {delegate} delegate", self.path.display());
        Ok(Box::new(ReplaySource::open(&self.path)?))
    }
}
