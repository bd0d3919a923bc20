//! Foreground-application exclusion.
//!
//! An [`ExclusionFilter`] watches which application has focus and tells the
//! engine when to pause (the excluded app gained focus) and resume.

/// Edge reported by an exclusion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionEvent {
    Enter,
    Exit,
}

/// Decides which foreground application suspends the engine.
pub trait ExclusionFilter: Send {
    /// Start observing. Returns `Some(Enter)` when the condition already holds.
    fn subscribe(&mut self) -> Option<ExclusionEvent>;

    /// Feed the newly focused application id. Returns an event only on edges.
    fn observe(&mut self, app: &str) -> Option<ExclusionEvent>;

    fn unsubscribe(&mut self);
}

/// Pauses while any application from a fixed list has focus.
///
/// Matching is case-insensitive on the app id or window class.
#[derive(Debug, Clone, Default)]
pub struct AppListFilter {
    apps: Vec<String>,
    focused: Option<String>,
    active: bool,
    subscribed: bool,
}

impl AppListFilter {
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            apps: apps
                .into_iter()
                .map(|a| a.as_ref().trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// Seed the currently focused application, if known at construction.
    pub fn with_focus(mut self, app: Option<String>) -> Self {
        self.focused = app;
        self
    }

    fn matches(&self, app: &str) -> bool {
        let app = app.to_lowercase();
        self.apps.iter().any(|a| *a == app)
    }

    fn update(&mut self, matching: bool) -> Option<ExclusionEvent> {
        match (self.active, matching) {
            (false, true) => {
                self.active = true;
                Some(ExclusionEvent::Enter)
            }
            (true, false) => {
                self.active = false;
                Some(ExclusionEvent::Exit)
            }
            _ => None,
        }
    }
}

impl ExclusionFilter for AppListFilter {
    fn subscribe(&mut self) -> Option<ExclusionEvent> {
        self.subscribed = true;
        self.active = false;
        let matching = self.focused.as_deref().is_some_and(|app| self.matches(app));
        self.update(matching)
    }

    fn observe(&mut self, app: &str) -> Option<ExclusionEvent> {
        self.focused = Some(app.to_string());
        if !self.subscribed {
            return None;
        }
        let matching = self.matches(app);
        self.update(matching)
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
        self.active = false;
    }
}
