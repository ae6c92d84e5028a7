use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::{consts::signal::SIGINT, consts::signal::SIGTERM, iterator::Signals};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};

use galaxyctl::config::{ConfigState, Profile};
use galaxyctl::landmarks::ReplayFactory;
use galaxyctl::photos::PhotoCollection;
use galaxyctl::presenter::{JsonPresenter, LogPresenter, Presenter};
use galaxyctl::session::{Session, SessionEvent};

/// Inputs shared by `run` and `replay`.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub frames: PathBuf,
    pub photos: PathBuf,
    pub profile: Option<String>,
    pub fps: Option<u32>,
    pub json: bool,
}

/// A session plus its presenter and frame pacing.
pub struct Pipeline {
    pub session: Session,
    presenter: Box<dyn Presenter>,
    started: Instant,
    fps_override: Option<u32>,
    interval: Duration,
}

fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

impl Pipeline {
    pub fn new(opts: &PipelineOptions, profile: &Profile) -> Result<Self> {
        let photos = PhotoCollection::load(&opts.photos)?;
        let factory = ReplayFactory {
            path: opts.frames.clone(),
        };
        let presenter: Box<dyn Presenter> = if opts.json {
            Box::new(JsonPresenter::new(std::io::stdout()))
        } else {
            Box::new(LogPresenter::default())
        };
        Ok(Self::with_parts(
            Session::new(photos, Box::new(factory), profile),
            presenter,
            opts.fps,
            profile,
        ))
    }

    pub fn with_parts(
        session: Session,
        presenter: Box<dyn Presenter>,
        fps_override: Option<u32>,
        profile: &Profile,
    ) -> Self {
        Self {
            session,
            presenter,
            started: Instant::now(),
            fps_override,
            interval: frame_interval(fps_override.unwrap_or(profile.tracking.fps)),
        }
    }

    /// Milliseconds on the session clock.
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn apply_profile(&mut self, profile: &Profile) {
        self.session.apply_profile(profile);
        self.interval = frame_interval(self.fps_override.unwrap_or(profile.tracking.fps));
    }

    pub fn emit(&mut self, now_ms: u64, events: &[SessionEvent]) {
        let snapshot = self.session.snapshot();
        if let Err(e) = self.presenter.present(now_ms, events, &snapshot) {
            error!("presenter failed: {e}");
        }
    }

    pub fn step(&mut self, now_ms: u64) {
        let events = self.session.tick(now_ms);
        self.emit(now_ms, &events);
    }

    /// Closes the session (releasing the source) and reports the final transition.
    pub fn shutdown(&mut self) {
        let now = self.now_ms();
        let events = self.session.close();
        self.emit(now, &events);
    }
}

/// Set once SIGINT or SIGTERM arrives.
pub fn stop_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let f = flag.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("received signal {sig}, shutting down");
            f.store(true, Ordering::SeqCst);
        }
    });
    Ok(flag)
}

/// Watches the profiles directory; editors often replace files, so the directory is watched
/// rather than the active file itself.
pub struct ProfileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
}

impl ProfileWatcher {
    pub fn watch(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                for p in ev.paths {
                    let _ = tx.send(p);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("profile watch error: {e}"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!("watching {}", dir.display());
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Whether `path` changed since the last call. Bursts collapse into one change.
    pub fn changed(&self, path: &Path) -> bool {
        let mut hit = false;
        while let Ok(p) = self.rx.try_recv() {
            if p.file_name() == path.file_name() {
                hit = true;
            }
        }
        hit
    }
}

/// Drives a recording through a session on a simulated clock: open, consent, one tick per
/// frame interval until the recording ends, a settling second for pending deadlines, close.
pub fn replay(opts: &PipelineOptions) -> Result<()> {
    let cfg = ConfigState::load_or_install_default()?;
    let profile = match &opts.profile {
        Some(name) => cfg.profile_named(name)?,
        None => cfg.profile.clone(),
    };
    let mut pipeline = Pipeline::new(opts, &profile)?;
    let step_ms = (pipeline.interval().as_millis() as u64).max(1);
    info!(
        "replaying {} at {} ms per frame",
        opts.frames.display(),
        step_ms
    );

    let mut now = 0;
    let events = pipeline.session.open();
    pipeline.emit(now, &events);
    let events = pipeline.session.begin(now);
    pipeline.emit(now, &events);
    if !pipeline.session.is_tracking() {
        let reason = pipeline
            .session
            .snapshot()
            .tracking_error
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("tracking unavailable: {reason}"));
    }

    loop {
        pipeline.step(now);
        if pipeline.session.source_finished() || !pipeline.session.is_tracking() {
            break;
        }
        now += step_ms;
    }
    for _ in 0..(1000 / step_ms) {
        now += step_ms;
        pipeline.step(now);
    }

    let diag = pipeline.session.diagnostics();
    info!(
        "replay done: {} frame(s), {:.1} fps",
        diag.frames_processed, diag.fps
    );
    let events = pipeline.session.close();
    pipeline.emit(now, &events);
    Ok(())
}
