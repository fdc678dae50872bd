use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{is_installed, BrowserEnvironment, ManualInstructions, Platform};
use crate::error::PromptError;

/// The user's answer to the install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserChoice {
    Accepted,
    Dismissed,
}

/// The platform's deferred offer to install the app.
///
/// Delivered with the pre-install event. The tracker calls
/// `prevent_default` when capturing it and `prompt` at most once.
#[async_trait]
pub trait InstallPrompt: Send {
    /// Suppress the platform's own install banner
    fn prevent_default(&mut self);

    /// Show the prompt and wait for the user's decision
    async fn prompt(&mut self) -> Result<UserChoice, PromptError>;
}

/// What happened when the user asked to install.
#[derive(Debug)]
pub enum InstallOutcome {
    Prompted(UserChoice),
    PromptFailed(PromptError),
    AlreadyInstalled,
    Manual(ManualInstructions),
}

/// Per-session install state: the captured prompt and whether an install
/// happened during this session. Owned by the page session and handed to
/// the UI, never global.
pub struct InstallTracker {
    environment: Option<BrowserEnvironment>,
    capture: Option<Box<dyn InstallPrompt>>,
    installed_this_session: bool,
}

impl InstallTracker {
    pub fn new(environment: Option<BrowserEnvironment>) -> Self {
        Self {
            environment,
            capture: None,
            installed_this_session: false,
        }
    }

    pub fn environment(&self) -> Option<&BrowserEnvironment> {
        self.environment.as_ref()
    }

    /// Recomputed on every call from the environment.
    pub fn is_installed(&self) -> bool {
        self.installed_this_session || is_installed(self.environment.as_ref())
    }

    pub fn has_prompt(&self) -> bool {
        self.capture.is_some()
    }

    /// Handler for the platform's install offer.
    pub fn on_before_install_prompt(&mut self, mut prompt: Box<dyn InstallPrompt>) {
        prompt.prevent_default();
        if self.capture.is_some() {
            debug!("Replacing pending install prompt");
        }
        self.capture = Some(prompt);
        info!("Install prompt available");
    }

    /// Handler for the platform's install-completed signal.
    pub fn on_app_installed(&mut self) {
        self.capture = None;
        self.installed_this_session = true;
        info!("App installed");
    }

    /// User-invoked install.
    ///
    /// The captured prompt is consumed whatever the answer. Without one the
    /// user gets manual instructions unless the app is already installed.
    pub async fn trigger_install(&mut self) -> InstallOutcome {
        let Some(mut prompt) = self.capture.take() else {
            if self.is_installed() {
                return InstallOutcome::AlreadyInstalled;
            }
            return InstallOutcome::Manual(self.manual_instructions());
        };

        match prompt.prompt().await {
            Ok(choice) => {
                debug!(?choice, "Install prompt answered");
                if choice == UserChoice::Accepted {
                    self.installed_this_session = true;
                }
                InstallOutcome::Prompted(choice)
            }
            Err(e) => {
                warn!(error = %e, "Install prompt failed");
                InstallOutcome::PromptFailed(e)
            }
        }
    }

    pub fn manual_instructions(&self) -> ManualInstructions {
        let platform = self
            .environment
            .as_ref()
            .map(|env| env.platform())
            .unwrap_or(Platform::Unknown);
        ManualInstructions::for_platform(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::DisplayMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        prevented: AtomicUsize,
        prompted: AtomicUsize,
    }

    struct FakePrompt {
        answer: Result<UserChoice, PromptError>,
        counters: Arc<Counters>,
    }

    impl FakePrompt {
        fn boxed(
            answer: Result<UserChoice, PromptError>,
            counters: &Arc<Counters>,
        ) -> Box<dyn InstallPrompt> {
            Box::new(Self {
                answer,
                counters: counters.clone(),
            })
        }
    }

    #[async_trait]
    impl InstallPrompt for FakePrompt {
        fn prevent_default(&mut self) {
            self.counters.prevented.fetch_add(1, Ordering::SeqCst);
        }

        async fn prompt(&mut self) -> Result<UserChoice, PromptError> {
            self.counters.prompted.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn browser_tab() -> Option<BrowserEnvironment> {
        Some(BrowserEnvironment {
            display_mode: DisplayMode::Browser,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_accepted_prompt_marks_installed() {
        let counters = Arc::new(Counters::default());
        let mut tracker = InstallTracker::new(browser_tab());
        tracker.on_before_install_prompt(FakePrompt::boxed(Ok(UserChoice::Accepted), &counters));
        assert_eq!(counters.prevented.load(Ordering::SeqCst), 1);
        assert!(!tracker.is_installed());

        let outcome = tracker.trigger_install().await;
        assert!(matches!(outcome, InstallOutcome::Prompted(UserChoice::Accepted)));
        assert!(tracker.is_installed());
        assert!(!tracker.has_prompt());
    }

    #[tokio::test]
    async fn test_prompt_is_single_use() {
        let counters = Arc::new(Counters::default());
        let mut tracker = InstallTracker::new(browser_tab());
        tracker.on_before_install_prompt(FakePrompt::boxed(Ok(UserChoice::Dismissed), &counters));

        let first = tracker.trigger_install().await;
        assert!(matches!(first, InstallOutcome::Prompted(UserChoice::Dismissed)));
        assert!(!tracker.is_installed());

        let second = tracker.trigger_install().await;
        match second {
            InstallOutcome::Manual(instructions) => {
                assert_eq!(instructions.platform, Platform::DesktopChrome);
            }
            other => panic!("expected manual instructions, got {other:?}"),
        }
        assert_eq!(counters.prompted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_installed_signal_clears_capture() {
        let counters = Arc::new(Counters::default());
        let mut tracker = InstallTracker::new(browser_tab());
        tracker.on_before_install_prompt(FakePrompt::boxed(Ok(UserChoice::Accepted), &counters));
        tracker.on_app_installed();

        assert!(tracker.is_installed());
        assert!(!tracker.has_prompt());
        let outcome = tracker.trigger_install().await;
        assert!(matches!(outcome, InstallOutcome::AlreadyInstalled));
        assert_eq!(counters.prompted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_later_offer_replaces_pending_one() {
        let stale = Arc::new(Counters::default());
        let fresh = Arc::new(Counters::default());
        let mut tracker = InstallTracker::new(browser_tab());
        tracker.on_before_install_prompt(FakePrompt::boxed(Ok(UserChoice::Dismissed), &stale));
        tracker.on_before_install_prompt(FakePrompt::boxed(Ok(UserChoice::Accepted), &fresh));

        let outcome = tracker.trigger_install().await;
        assert!(matches!(outcome, InstallOutcome::Prompted(UserChoice::Accepted)));
        assert_eq!(stale.prompted.load(Ordering::SeqCst), 0);
        assert_eq!(fresh.prompted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_prompt_is_discarded() {
        let counters = Arc::new(Counters::default());
        let mut tracker = InstallTracker::new(browser_tab());
        tracker.on_before_install_prompt(FakePrompt::boxed(
            Err(PromptError("prompt() already called".to_string())),
            &counters,
        ));

        assert!(matches!(tracker.trigger_install().await, InstallOutcome::PromptFailed(_)));
        assert!(matches!(tracker.trigger_install().await, InstallOutcome::Manual(_)));
    }

    #[tokio::test]
    async fn test_no_browser_falls_back_to_all_instructions() {
        let mut tracker = InstallTracker::new(None);
        assert!(!tracker.is_installed());
        match tracker.trigger_install().await {
            InstallOutcome::Manual(instructions) => {
                assert_eq!(instructions.platform, Platform::Unknown)
            }
            other => panic!("expected manual instructions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_standalone_launch_is_already_installed() {
        let mut tracker = InstallTracker::new(Some(BrowserEnvironment {
            display_mode: DisplayMode::Standalone,
            ..Default::default()
        }));
        assert!(matches!(tracker.trigger_install().await, InstallOutcome::AlreadyInstalled));
    }
}
