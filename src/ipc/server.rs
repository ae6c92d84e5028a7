use anyhow::{Result, anyhow};
use log::{error, info, warn};
use serde_json::{Value, json};
use std::{
    fs, io,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::{atomic::Ordering, mpsc},
    thread,
    time::{Duration, Instant},
};

use super::dispatch::{Request, handle_request};
use super::pipeline::{Pipeline, PipelineOptions, ProfileWatcher, stop_flag};
use super::runtime::socket_path;
use galaxyctl::config::ConfigState;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// A request waiting for the frame loop, with the channel its reply goes back on.
struct Pending {
    req: Request,
    reply: mpsc::Sender<Value>,
}

/// Removes the socket file on every exit path.
struct SocketGuard(PathBuf);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// Runs the daemon in the foreground until `shutdown` or SIGINT/SIGTERM.
///
/// The frame loop owns the session. Client threads only parse requests and forward them over
/// a channel, so session state is never touched off the loop.
pub fn run_daemon(opts: PipelineOptions) -> Result<()> {
    let sock = socket_path()?;
    if sock.exists() {
        if UnixStream::connect(&sock).is_ok() {
            return Err(anyhow!(
                "galaxyctl daemon already running (socket {})",
                sock.display()
            ));
        }
        let _ = fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    let _guard = SocketGuard(sock.clone());
    listener.set_nonblocking(true)?;
    info!("daemon: listening on {}", sock.display());

    let mut cfg = ConfigState::load_or_install_default()?;
    if let Some(name) = &opts.profile {
        cfg.set_active(name)?;
    }
    info!("daemon: active profile '{}'", cfg.active_name);

    let mut pipeline = Pipeline::new(&opts, &cfg.profile)?;
    let watcher = match ProfileWatcher::watch(&cfg.profiles_dir) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile hot-reload disabled: {e}");
            None
        }
    };
    let stop = stop_flag()?;
    let (tx_req, rx_req) = mpsc::channel::<Pending>();

    let mut next_frame = Instant::now();
    'serve: while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("accept failed: {e}"),
        }

        while let Ok(Pending { req, reply }) = rx_req.try_recv() {
            let shutdown = req == Request::Shutdown;
            let resp = handle_request(req, &mut pipeline, &mut cfg, &sock);
            let _ = reply.send(resp);
            if shutdown {
                info!("daemon: shutdown requested");
                break 'serve;
            }
        }

        if watcher
            .as_ref()
            .is_some_and(|w| w.changed(&cfg.active_path()))
        {
            match cfg.reload() {
                Ok(()) => {
                    pipeline.apply_profile(&cfg.profile);
                    info!("profile '{}' changed on disk, reloaded", cfg.active_name);
                }
                Err(e) => error!("reload failed, keeping last good profile: {e}"),
            }
        }

        let now = Instant::now();
        if now >= next_frame {
            pipeline.step(pipeline.now_ms());
            next_frame = now + pipeline.interval();
        }
        thread::sleep(
            next_frame
                .saturating_duration_since(Instant::now())
                .min(IDLE_SLEEP),
        );
    }

    pipeline.shutdown();
    info!("daemon: stopped");
    Ok(())
}

fn handle_client(mut stream: UnixStream, tx_req: mpsc::Sender<Pending>) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let resp = match serde_json::from_str::<Request>(&line) {
        Ok(req) => {
            let (reply, rx) = mpsc::channel();
            tx_req
                .send(Pending { req, reply })
                .map_err(|_| anyhow!("daemon is shutting down"))?;
            rx.recv_timeout(REPLY_TIMEOUT)
                .unwrap_or_else(|_| json!({"ok": false, "error": "daemon did not answer"}))
        }
        Err(e) => json!({"ok": false, "error": format!("bad request: {e}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

// client helper
pub fn client_request(req: Value) -> Result<Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "galaxyctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: Value = serde_json::from_str(&resp)?;
    Ok(v)
}
