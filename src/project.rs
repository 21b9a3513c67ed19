use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Project file format version.
const PROJECT_VERSION: u32 = 1;

/// Default sample rate for new projects.
pub const DEFAULT_RATE: f64 = 44_100.0;

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid project: {0}")]
    InvalidProject(String),
}

impl Serialize for ProjectError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ── Model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TrackKind {
    Wave,
    Label,
    Note,
}

impl TrackKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Wave => "wave",
            Self::Label => "label",
            Self::Note => "note",
        }
    }

    /// Only playable tracks carry mute/solo/gain/pan.
    pub fn is_playable(self) -> bool {
        matches!(self, Self::Wave | Self::Note)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub minimized: bool,
    /// Gain in dB.
    #[serde(default)]
    pub gain_db: f64,
    /// -1.0 (left) … 1.0 (right).
    #[serde(default)]
    pub pan: f64,
    /// Linear peak amplitude of the audio, 0.0 for silence.
    #[serde(default)]
    pub peak: f64,
    /// Start of the track's audio in seconds.
    #[serde(default)]
    pub offset: f64,
    /// Length of the track's audio in seconds.
    #[serde(default)]
    pub duration: f64,
}

impl Track {
    pub fn new(name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            name: name.into(),
            kind,
            selected: false,
            mute: false,
            solo: false,
            minimized: false,
            gain_db: 0.0,
            pan: 0.0,
            peak: 0.0,
            offset: 0.0,
            duration: 0.0,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.offset + self.duration
    }
}

/// Time selection in seconds. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectedRegion {
    start: f64,
    end: f64,
}

impl SelectedRegion {
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum SnapMode {
    #[default]
    Off,
    Nearest,
    Prior,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub rate: f64,
    #[serde(default)]
    pub snap_to: SnapMode,
    #[serde(default = "default_selection_format")]
    pub selection_format: String,
    #[serde(default)]
    pub selection: SelectedRegion,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

fn default_selection_format() -> String {
    "hh:mm:ss + milliseconds".to_string()
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate: DEFAULT_RATE,
            snap_to: SnapMode::Off,
            selection_format: default_selection_format(),
            selection: SelectedRegion::default(),
            tracks: Vec::new(),
        }
    }

    /// Replace the time selection. Endpoints may come in either order.
    pub fn modify_selection(&mut self, start: f64, end: f64) {
        self.selection = SelectedRegion::new(start, end);
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn selected_tracks(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks.iter().enumerate().filter(|(_, t)| t.selected)
    }
}

/// Shared handle to a project. The invoker serializes access through the lock.
pub type ProjectHandle = Arc<Mutex<Project>>;

// ── JSON envelope ───────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    project: Project,
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Per-file mutex map to serialize concurrent writes to the same path.
static FILE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Atomically write bytes to a file using write-to-temp-then-rename.
///
/// The existing file is kept as a `.bak` sibling (best-effort).
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ProjectError> {
    let lock = FILE_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let _guard = lock.lock();

    let file_name = path.file_name().unwrap_or_default();

    let mut tmp_name = OsString::from(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);

    let mut bak_name = OsString::from(file_name);
    bak_name.push(".bak");
    let bak_path = path.with_file_name(&bak_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    if path.exists() {
        let _ = fs::rename(path, &bak_path);
    }

    fs::rename(&tmp_path, path)?;

    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

// ── Save / Load ─────────────────────────────────────────────────────

pub fn save_project(project: &Project, path: &Path) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = ProjectFile {
        version: PROJECT_VERSION,
        project: project.clone(),
    };
    write_json(path, &file)
}

pub fn load_project(path: &Path) -> Result<Project, ProjectError> {
    let file: ProjectFile = read_json(path)?;
    if file.version > PROJECT_VERSION {
        return Err(ProjectError::InvalidProject(format!(
            "unsupported project version {} (expected <= {PROJECT_VERSION})",
            file.version
        )));
    }
    if !file.project.rate.is_finite() || file.project.rate <= 0.0 {
        return Err(ProjectError::InvalidProject(format!(
            "sample rate must be positive, got {}",
            file.project.rate
        )));
    }
    Ok(file.project)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn setup_test_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "cmdctx_test_project_{}_{}",
            std::process::id(),
            id
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_selection_normalizes_order() {
        let mut project = Project::new("Test");
        project.modify_selection(5.0, 2.0);
        assert_eq!(project.selection.start(), 2.0);
        assert_eq!(project.selection.end(), 5.0);
        assert_eq!(project.selection.duration(), 3.0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = setup_test_dir();
        let path = dir.join("session.json");

        let mut project = Project::new("Session");
        project.tracks.push(Track::new("Vocals", TrackKind::Wave));
        project.tracks[0].gain_db = -3.0;
        project.modify_selection(1.0, 4.5);
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.name, "Session");
        assert_eq!(loaded.tracks.len(), 1);
        assert_eq!(loaded.tracks[0].gain_db, -3.0);
        assert_eq!(loaded.selection, SelectedRegion::new(1.0, 4.5));

        // Second save keeps a backup of the first
        save_project(&project, &path).unwrap();
        assert!(dir.join("session.json.bak").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_future_version() {
        let dir = setup_test_dir();
        let path = dir.join("future.json");
        let json = serde_json::json!({
            "version": 99,
            "project": { "name": "Future", "rate": 48000.0 }
        });
        fs::write(&path, json.to_string()).unwrap();

        let err = load_project(&path).unwrap_err();
        assert!(matches!(err, ProjectError::InvalidProject(_)));

        let _ = fs::remove_dir_all(&dir);
    }
}
