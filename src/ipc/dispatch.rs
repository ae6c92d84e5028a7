use anyhow::{Result, anyhow};
use log::{error, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use super::pipeline::Pipeline;
use galaxyctl::config::ConfigState;
use galaxyctl::controller::Key;
use galaxyctl::photos::PhotoCollection;

/// Control-socket request, one JSON object per line: `{"op": "select", "id": "p3"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Status,
    Diag,
    Open,
    Begin,
    Close,
    Key {
        key: String,
    },
    Select {
        id: String,
    },
    Hover {
        #[serde(default)]
        id: Option<String>,
    },
    Next,
    Prev,
    Photos {
        path: PathBuf,
    },
    Reload,
    Use {
        profile: String,
    },
    List,
    Doctor,
    Shutdown,
}

/// Runs one request against the loop-owned state and builds the `{"ok", "data"|"error"}` reply.
pub fn handle_request(
    req: Request,
    pipeline: &mut Pipeline,
    cfg: &mut ConfigState,
    socket: &Path,
) -> Value {
    match apply(req, pipeline, cfg, socket) {
        Ok(data) => json!({"ok": true, "data": data}),
        Err(e) => {
            error!("request failed: {e}");
            json!({"ok": false, "error": e.to_string()})
        }
    }
}

fn apply(
    req: Request,
    pipeline: &mut Pipeline,
    cfg: &mut ConfigState,
    socket: &Path,
) -> Result<Value> {
    let now = pipeline.now_ms();
    let events = match req {
        Request::Status => return Ok(serde_json::to_value(pipeline.session.snapshot())?),
        Request::Diag => return Ok(serde_json::to_value(pipeline.session.diagnostics())?),
        Request::List => {
            return Ok(json!({"profiles": cfg.list_profiles(), "active": cfg.active_name}));
        }
        Request::Doctor => return Ok(cfg.doctor_report(socket)),
        Request::Shutdown => return Ok(json!("shutting down")),
        Request::Reload => {
            cfg.reload()?;
            pipeline.apply_profile(&cfg.profile);
            info!("profile '{}' reloaded", cfg.active_name);
            return Ok(json!({"active_profile": cfg.active_name}));
        }
        Request::Use { profile } => {
            cfg.set_active(&profile)?;
            pipeline.apply_profile(&cfg.profile);
            info!("switched active profile to {}", cfg.active_name);
            return Ok(json!({"active_profile": cfg.active_name}));
        }
        Request::Open => pipeline.session.open(),
        Request::Begin => pipeline.session.begin(now),
        Request::Close => pipeline.session.close(),
        Request::Key { key } => {
            let k = Key::parse(&key).ok_or_else(|| anyhow!("unknown key: {key}"))?;
            pipeline.session.key(k)
        }
        Request::Select { id } => pipeline.session.select_photo(&id),
        Request::Hover { id } => {
            pipeline.session.hover_photo(id.as_deref());
            Vec::new()
        }
        Request::Next => pipeline.session.next(),
        Request::Prev => pipeline.session.prev(),
        Request::Photos { path } => {
            let photos = PhotoCollection::load(&path)?;
            pipeline.session.set_photos(photos)
        }
    };
    pipeline.emit(now, &events);
    Ok(json!({"events": events, "phase": pipeline.session.phase()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxyctl::controller::Phase;
    use galaxyctl::landmarks::ReplayFactory;
    use galaxyctl::photos::{Photo, PhotoCollection};
    use galaxyctl::presenter::LogPresenter;
    use galaxyctl::session::Session;
    use std::{fs, path::PathBuf};

    fn parse(line: &str) -> Request {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn parses_requests() {
        assert_eq!(parse(r#"{"op":"status"}"#), Request::Status);
        assert_eq!(
            parse(r#"{"op":"key","key":"Escape"}"#),
            Request::Key {
                key: "Escape".into()
            }
        );
        assert_eq!(parse(r#"{"op":"hover"}"#), Request::Hover { id: None });
        assert_eq!(
            parse(r#"{"op":"use","profile":"fast"}"#),
            Request::Use {
                profile: "fast".into()
            }
        );
        assert!(serde_json::from_str::<Request>(r#"{"op":"explode"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"op":"select"}"#).is_err());
        assert_eq!(
            parse(r#"{"op":"photos","path":"/tmp/p.json"}"#),
            Request::Photos {
                path: "/tmp/p.json".into()
            }
        );
    }

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("galaxyctl-ipc-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn drives_session_through_requests() {
        let dir = scratch("dispatch");
        let rec = dir.join("rec.jsonl");
        fs::write(&rec, "{\"t\": 0}\n").unwrap();
        let mut cfg = ConfigState::load_or_install_in(dir.join("cfg")).unwrap();
        let photos = PhotoCollection::from_posts(vec![
            Photo::new("a", "https://img/a.jpg"),
            Photo::new("b", "https://img/b.jpg"),
        ]);
        let session = Session::new(
            photos,
            Box::new(ReplayFactory { path: rec }),
            &cfg.profile,
        );
        let profile = cfg.profile.clone();
        let mut p = Pipeline::with_parts(session, Box::new(LogPresenter::default()), None, &profile);
        let sock = dir.join("test.sock");

        let r = handle_request(Request::Open, &mut p, &mut cfg, &sock);
        assert_eq!(r["ok"], true);
        assert_eq!(r["data"]["phase"], "welcome");

        let r = handle_request(Request::Begin, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["phase"], "browsing");

        let r = handle_request(Request::Select { id: "b".into() }, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["events"][0]["counter"], "2 / 2");
        assert_eq!(p.session.phase(), Phase::DetailView);

        let r = handle_request(Request::Key { key: "Enter".into() }, &mut p, &mut cfg, &sock);
        assert_eq!(r["ok"], false);

        let r = handle_request(Request::Status, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["selected_photo"]["id"], "b");
        assert_eq!(r["data"]["is_tracking"], true);

        let posts = dir.join("posts.json");
        fs::write(
            &posts,
            r#"[{"id": "a", "imgUrl": "https://img/a.jpg"}, {"id": "c", "imgUrl": ""}]"#,
        )
        .unwrap();
        let r = handle_request(Request::Photos { path: posts }, &mut p, &mut cfg, &sock);
        assert_eq!(r["ok"], true);
        assert_eq!(r["data"]["events"][0]["counter"], "1 / 1");
        assert_eq!(p.session.snapshot().photo_count, 1);
        let r = handle_request(
            Request::Photos { path: dir.join("missing.json") },
            &mut p,
            &mut cfg,
            &sock,
        );
        assert_eq!(r["ok"], false);

        let r = handle_request(Request::Use { profile: "missing".into() }, &mut p, &mut cfg, &sock);
        assert_eq!(r["ok"], false);

        let r = handle_request(Request::Key { key: "Escape".into() }, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["phase"], "browsing");
        let r = handle_request(Request::Close, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["phase"], "closed");

        let r = handle_request(Request::Doctor, &mut p, &mut cfg, &sock);
        assert_eq!(r["data"]["daemon_running"], false);

        let _ = fs::remove_dir_all(&dir);
    }
}
