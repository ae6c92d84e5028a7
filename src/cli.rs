use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf, process::Command};

use crate::ipc::{self, PipelineOptions};
use galaxyctl::config::ConfigState;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let opts = pipeline_options(&mut pargs, "run")?;
            ipc::run_daemon(opts)
        }

        Some("start") => {
            let opts = pipeline_options(&mut pargs, "start")?;
            let exe = std::env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("run")
                .arg("--frames")
                .arg(&opts.frames)
                .arg("--photos")
                .arg(&opts.photos);
            if let Some(p) = &opts.profile {
                cmd.arg("--profile").arg(p);
            }
            if let Some(fps) = opts.fps {
                cmd.arg("--fps").arg(fps.to_string());
            }
            if opts.json {
                cmd.arg("--json");
            }
            let child = cmd.spawn()?;
            println!("galaxyctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("replay") => {
            let opts = pipeline_options(&mut pargs, "replay")?;
            ipc::replay(&opts)
        }

        Some("stop") => request(serde_json::json!({"op": "shutdown"})),

        Some(op @ ("status" | "diag" | "open" | "begin" | "close" | "next" | "prev" | "reload")) => {
            request(serde_json::json!({ "op": op }))
        }

        Some("key") => {
            let key: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: galaxyctl key <Escape|ArrowLeft|ArrowRight>"))?;
            request(serde_json::json!({"op": "key", "key": key}))
        }

        Some("select") => {
            let id: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: galaxyctl select <photo_id>"))?;
            request(serde_json::json!({"op": "select", "id": id}))
        }

        Some("hover") => {
            let id: Option<String> = pargs.opt_free_from_str()?;
            request(serde_json::json!({"op": "hover", "id": id}))
        }

        Some("photos") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: galaxyctl photos <photos.json>"))?;
            // the daemon may run from another directory
            let path = path.canonicalize()?;
            request(serde_json::json!({"op": "photos", "path": path.display().to_string()}))
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: galaxyctl use <profile_name>"))?;
            // a running daemon switches and reloads; otherwise just move the pointer
            if ipc::socket_path()?.exists() {
                request(serde_json::json!({"op": "use", "profile": name}))
            } else {
                let mut cfg = ConfigState::load_or_install_default()?;
                cfg.set_active(&name)?;
                println!("active profile: {}", cfg.active_name);
                Ok(())
            }
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            for name in cfg.list_profiles() {
                let mark = if name == cfg.active_name { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&cfg.doctor_report(&ipc::socket_path()?));
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// `--photos`, `--profile`, `--fps`, `--json`, plus the recording: `--frames <path>` for
/// `run`/`start`, a positional path for `replay`.
fn pipeline_options(pargs: &mut Arguments, cmd: &str) -> Result<PipelineOptions> {
    let usage = || match cmd {
        "replay" => anyhow!(
            "usage: galaxyctl replay <rec.jsonl> --photos <photos.json> [--fps N] [--profile name] [--json]"
        ),
        _ => anyhow!(
            "usage: galaxyctl {cmd} --frames <rec.jsonl> --photos <photos.json> [--profile name] [--json]"
        ),
    };

    let photos: PathBuf = pargs.value_from_str("--photos").map_err(|_| usage())?;
    let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
    let fps: Option<u32> = pargs.opt_value_from_str("--fps")?;
    let json = pargs.contains("--json");
    let frames: PathBuf = if cmd == "replay" {
        pargs.free_from_str().map_err(|_| usage())?
    } else {
        pargs.value_from_str("--frames").map_err(|_| usage())?
    };
    if fps == Some(0) {
        return Err(anyhow!("--fps must be positive"));
    }

    Ok(PipelineOptions {
        frames,
        photos,
        profile,
        fps,
        json,
    })
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

fn print_help() {
    println!(
        r#"galaxyctl - hand-gesture photo browser daemon

USAGE:
  galaxyctl help [command]                    Show general or command-specific help
  galaxyctl run --frames <rec> --photos <p>   Run the daemon in the foreground
  galaxyctl start --frames <rec> --photos <p> Start the daemon in the background
  galaxyctl stop                              Stop the daemon
  galaxyctl replay <rec> --photos <p>         Drive a session from a recording, offline
  galaxyctl status                            Show the session snapshot
  galaxyctl diag                              Show tracking diagnostics
  galaxyctl open | begin | close              Open Galaxy Mode, start tracking, close it
  galaxyctl key <Escape|ArrowLeft|ArrowRight> Send a key press
  galaxyctl select <photo_id>                 Open a photo directly
  galaxyctl hover [photo_id]                  Hover a photo card (none to leave)
  galaxyctl next | prev                       Step through photos in the detail view
  galaxyctl photos <photos.json>              Swap in a new photo collection
  galaxyctl reload                            Reload active profile
  galaxyctl use <name>                        Switch active profile
  galaxyctl list                              List profiles
  galaxyctl doctor                            Check config, profiles and socket

TIPS:
  - Profiles: ~/.config/galaxyctl/profiles
  - Active profile pointer: ~/.config/galaxyctl/active
  - Control socket: ~/.local/run/galaxyctl.sock
  - RUST_LOG=debug shows per-frame detail
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: galaxyctl run --frames <rec.jsonl> --photos <photos.json> [--profile <name>] [--fps N] [--json]\nRuns the daemon in the foreground. --json prints one JSON line per update on stdout."
        ),
        "start" => println!(
            "usage: galaxyctl start --frames <rec.jsonl> --photos <photos.json> [--profile <name>]\nStarts the daemon in the background."
        ),
        "stop" => println!("usage: galaxyctl stop\nStops the running daemon."),
        "replay" => println!(
            "usage: galaxyctl replay <rec.jsonl> --photos <photos.json> [--fps N] [--profile <name>] [--json]\nOpens a session, consents, feeds the recording at its timestamps and closes."
        ),
        "status" => println!(
            "usage: galaxyctl status\nShows phase, gesture, hand position, edge warning, selection and scene."
        ),
        "diag" => println!(
            "usage: galaxyctl diag\nShows delegate, frames processed, fps, last error."
        ),
        "open" | "begin" | "close" => println!(
            "usage: galaxyctl open|begin|close\nopen shows the welcome screen, begin starts the camera, close ends the session."
        ),
        "key" => println!("usage: galaxyctl key <Escape|ArrowLeft|ArrowRight>"),
        "select" => println!("usage: galaxyctl select <photo_id>\nOpens the photo in the detail view."),
        "hover" => println!("usage: galaxyctl hover [photo_id]"),
        "next" | "prev" => println!("usage: galaxyctl next|prev\nWraps around at either end."),
        "photos" => println!(
            "usage: galaxyctl photos <photos.json>\nReplaces the daemon's photo collection; the selection is kept in range."
        ),
        "reload" => println!(
            "usage: galaxyctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: galaxyctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: galaxyctl list\nLists available profiles; marks active with '*'.")
        }
        "doctor" => println!(
            "usage: galaxyctl doctor\nChecks config paths, profile validity and the control socket."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
