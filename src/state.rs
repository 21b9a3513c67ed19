use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::project::{Project, ProjectHandle};
use crate::registry::CommandDirectory;
use crate::settings::AppSettings;

// ── Application State ──────────────────────────────────────────────

/// Process-wide application object. Owns the open projects and tracks which
/// one is active; commands reach it through `CommandContext::host`.
pub struct AppState {
    pub name: &'static str,
    pub version: &'static str,
    pub app_config_dir: PathBuf,
    pub settings: Mutex<AppSettings>,
    /// Commands available to every surface.
    pub commands: CommandDirectory,
    projects: Mutex<Vec<ProjectHandle>>,
    active: Mutex<Option<usize>>,
}

impl AppState {
    pub fn new(app_config_dir: PathBuf, settings: AppSettings) -> Self {
        Self {
            name: "cmdctx",
            version: env!("CARGO_PKG_VERSION"),
            app_config_dir,
            settings: Mutex::new(settings),
            commands: CommandDirectory::with_builtins(),
            projects: Mutex::new(Vec::new()),
            active: Mutex::new(None),
        }
    }

    /// State with default settings and no config dir; used by tests and
    /// headless callers.
    pub fn headless() -> Arc<Self> {
        Arc::new(Self::new(PathBuf::new(), AppSettings::default()))
    }

    /// Register a project and make it the active one.
    pub fn open_project(&self, project: Project) -> ProjectHandle {
        let handle: ProjectHandle = Arc::new(Mutex::new(project));
        let mut projects = self.projects.lock();
        projects.push(Arc::clone(&handle));
        *self.active.lock() = Some(projects.len() - 1);
        handle
    }

    /// The project that commands act on when the context has no explicit binding.
    pub fn active_project(&self) -> Option<ProjectHandle> {
        let index = (*self.active.lock())?;
        self.projects.lock().get(index).cloned()
    }

    pub fn set_active(&self, index: usize) -> bool {
        if index < self.projects.lock().len() {
            *self.active.lock() = Some(index);
            true
        } else {
            false
        }
    }

    pub fn project_count(&self) -> usize {
        self.projects.lock().len()
    }

    /// Read-only access to a snapshot of the settings.
    pub fn with_settings<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppSettings) -> R,
    {
        let guard = self.settings.lock();
        f(&guard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn open_project_becomes_active() {
        let state = AppState::headless();
        assert!(state.active_project().is_none());

        state.open_project(Project::new("First"));
        let second = state.open_project(Project::new("Second"));
        let active = state.active_project().unwrap();
        assert!(Arc::ptr_eq(&active, &second));

        assert!(state.set_active(0));
        assert_eq!(state.active_project().unwrap().lock().name, "First");
        assert!(!state.set_active(5));
        assert_eq!(state.project_count(), 2);
    }
}
