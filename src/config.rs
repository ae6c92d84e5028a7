use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::landmarks::Delegate;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Recognition and interaction tuning. Distances are in normalized frame units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_confidence: f32,
    pub thumb_spread: f32,
    pub edge_margin: f32,
    pub no_hand_grace_frames: u32,
    pub swipe_window: usize,
    pub swipe_min_samples: usize,
    pub swipe_distance: f32,
    pub swipe_fast_distance: f32,
    pub swipe_velocity: f32,
    pub swipe_cooldown_ms: u64,
    pub swipe_pulse_ms: u64,
    pub detail_exit_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            thumb_spread: 0.05,
            edge_margin: 0.12,
            no_hand_grace_frames: 10,
            swipe_window: 10,
            swipe_min_samples: 3,
            swipe_distance: 0.08,
            swipe_fast_distance: 0.05,
            swipe_velocity: 0.3,
            swipe_cooldown_ms: 300,
            swipe_pulse_ms: 100,
            detail_exit_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tracking {
    pub fps: u32,
    /// Landmark source creation order; empty means the platform default.
    pub delegates: Vec<Delegate>,
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            fps: 30,
            delegates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub tracking: Tracking,
}

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("galaxyctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_or_install_in(config_dir()?)
    }

    /// Loads the active profile under `cfgdir`, installing the built-in default profile and
    /// active pointer on first use.
    pub fn load_or_install_in(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = match load_profile(&profdir, &active_name) {
            Ok(p) => p,
            Err(e) if active_name != "default" => {
                warn!("active profile '{active_name}' unusable ({e}); falling back to default");
                load_profile(&profdir, "default")?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn active_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    /// Re-reads the active profile; the last good profile stays in place on error.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Loads another profile without making it active.
    pub fn profile_named(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self, socket: &Path) -> serde_json::Value {
        let profiles: Vec<serde_json::Value> = self
            .list_profiles()
            .into_iter()
            .map(|name| {
                let status = match load_profile(&self.profiles_dir, &name) {
                    Ok(_) => "ok".to_string(),
                    Err(e) => e.to_string(),
                };
                serde_json::json!({"name": name, "status": status})
            })
            .collect();
        serde_json::json!({
            "user": whoami::username(),
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": profiles,
            "socket": socket,
            "daemon_running": socket.exists(),
            "delegate_order": effective_delegates(&self.profile.tracking),
        })
    }
}

pub fn effective_delegates(tracking: &Tracking) -> Vec<Delegate> {
    if tracking.delegates.is_empty() {
        Delegate::platform_order().to_vec()
    } else {
        tracking.delegates.clone()
    }
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let profile: Profile =
        toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
    validate_profile(&profile).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.swipe_cooldown_ms == 0 || th.swipe_pulse_ms == 0 || th.detail_exit_ms == 0 {
        return Err(anyhow!("thresholds must be positive durations"));
    }
    for (name, v) in [
        ("min_confidence", th.min_confidence),
        ("thumb_spread", th.thumb_spread),
        ("edge_margin", th.edge_margin),
        ("swipe_distance", th.swipe_distance),
        ("swipe_fast_distance", th.swipe_fast_distance),
    ] {
        if !(v > 0.0 && v < 1.0) {
            return Err(anyhow!(
                "thresholds.{name} must be in (0,1) normalized units, got {v}"
            ));
        }
    }
    if th.edge_margin >= 0.5 {
        return Err(anyhow!("thresholds.edge_margin must be below 0.5"));
    }
    if th.swipe_velocity <= 0.0 {
        return Err(anyhow!("thresholds.swipe_velocity must be positive"));
    }
    if th.swipe_min_samples < 2 {
        return Err(anyhow!("thresholds.swipe_min_samples must be at least 2"));
    }
    if th.swipe_window < th.swipe_min_samples {
        return Err(anyhow!(
            "thresholds.swipe_window ({}) must hold swipe_min_samples ({})",
            th.swipe_window,
            th.swipe_min_samples
        ));
    }
    if p.tracking.fps == 0 {
        return Err(anyhow!("tracking.fps must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("galaxyctl-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn builtin_profile_matches_defaults() {
        let p = Profile::from_toml_str(default_profile_text()).unwrap();
        assert_eq!(p.thresholds, Thresholds::default());
        assert_eq!(p.tracking.fps, 30);
        assert_eq!(p.meta.name.as_deref(), Some("default"));
    }

    #[test]
    fn partial_profile_fills_defaults() {
        let p = Profile::from_toml_str("[thresholds]\nswipe_distance = 0.1\n").unwrap();
        assert_eq!(p.thresholds.swipe_distance, 0.1);
        assert_eq!(p.thresholds.detail_exit_ms, 500);
        assert!(p.tracking.delegates.is_empty());
    }

    #[test]
    fn delegates_parse_lowercase() {
        let p = Profile::from_toml_str("[tracking]\ndelegates = [\"cpu\", \"gpu\"]\n").unwrap();
        assert_eq!(p.tracking.delegates, vec![Delegate::Cpu, Delegate::Gpu]);
        assert_eq!(effective_delegates(&p.tracking), vec![Delegate::Cpu, Delegate::Gpu]);
    }

    #[test]
    fn rejects_bad_thresholds() {
        for bad in [
            "[thresholds]\nedge_margin = 0.6\n",
            "[thresholds]\nmin_confidence = 1.5\n",
            "[thresholds]\nswipe_cooldown_ms = 0\n",
            "[thresholds]\nswipe_min_samples = 1\n",
            "[thresholds]\nswipe_window = 2\nswipe_min_samples = 3\n",
            "[tracking]\nfps = 0\n",
        ] {
            assert!(Profile::from_toml_str(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn installs_switches_and_keeps_last_good() {
        let dir = scratch_dir("config");
        let mut st = ConfigState::load_or_install_in(dir.clone()).unwrap();
        assert_eq!(st.active_name, "default");
        assert!(st.active_path().exists());

        fs::write(
            st.profiles_dir.join("fast.toml"),
            "[meta]\nname = \"fast\"\n[thresholds]\nswipe_cooldown_ms = 150\n",
        )
        .unwrap();
        assert_eq!(st.list_profiles(), vec!["default", "fast"]);

        st.set_active("fast").unwrap();
        assert_eq!(st.profile.thresholds.swipe_cooldown_ms, 150);
        assert_eq!(fs::read_to_string(&st.active_ptr).unwrap(), "fast");
        assert!(st.set_active("missing").is_err());

        fs::write(st.active_path(), "[thresholds]\nedge_margin = 2.0\n").unwrap();
        assert!(st.reload().is_err());
        assert_eq!(st.profile.thresholds.swipe_cooldown_ms, 150);

        // a broken active profile falls back to default on the next start
        let st = ConfigState::load_or_install_in(dir.clone()).unwrap();
        assert_eq!(st.profile.thresholds, Thresholds::default());

        let _ = fs::remove_dir_all(&dir);
    }
}
