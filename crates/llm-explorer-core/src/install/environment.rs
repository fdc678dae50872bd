use std::fmt;
use std::str::FromStr;

/// Referrer scheme used when Android launches an installed web app
const ANDROID_APP_REFERRER: &str = "android-app://";

/// The page's `display-mode` media feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Browser,
    MinimalUi,
    Standalone,
    Fullscreen,
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(DisplayMode::Browser),
            "minimal-ui" => Ok(DisplayMode::MinimalUi),
            "standalone" => Ok(DisplayMode::Standalone),
            "fullscreen" => Ok(DisplayMode::Fullscreen),
            other => Err(format!("unknown display mode: {}", other)),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayMode::Browser => "browser",
            DisplayMode::MinimalUi => "minimal-ui",
            DisplayMode::Standalone => "standalone",
            DisplayMode::Fullscreen => "fullscreen",
        };
        f.write_str(name)
    }
}

/// Platform family, used to pick manual install steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    DesktopChrome,
    DesktopEdge,
    DesktopFirefox,
    Unknown,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if is_ios_user_agent(user_agent) {
            Platform::Ios
        } else if user_agent.contains("Android") {
            Platform::Android
        } else if user_agent.contains("Firefox/") {
            Platform::DesktopFirefox
        } else if user_agent.contains("Edg/") {
            Platform::DesktopEdge
        } else if user_agent.contains("Chrome/") {
            Platform::DesktopChrome
        } else {
            Platform::Unknown
        }
    }
}

fn is_ios_user_agent(user_agent: &str) -> bool {
    user_agent.contains("iPhone") || user_agent.contains("iPad")
}

/// Snapshot of the browser signals that reveal an installed launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserEnvironment {
    pub display_mode: DisplayMode,
    pub user_agent: String,
    /// `navigator.standalone`, only reported by iOS Safari
    pub navigator_standalone: Option<bool>,
    pub referrer: String,
}

impl BrowserEnvironment {
    pub fn is_standalone_display(&self) -> bool {
        self.display_mode == DisplayMode::Standalone
    }

    pub fn is_ios_standalone(&self) -> bool {
        is_ios_user_agent(&self.user_agent) && self.navigator_standalone == Some(true)
    }

    pub fn launched_from_android_app(&self) -> bool {
        self.referrer.contains(ANDROID_APP_REFERRER)
    }

    pub fn platform(&self) -> Platform {
        Platform::from_user_agent(&self.user_agent)
    }
}

/// Is the app running installed?
///
/// `None` means there is no browser at all (e.g. rendering ahead of time),
/// which is never installed.
pub fn is_installed(environment: Option<&BrowserEnvironment>) -> bool {
    let Some(env) = environment else {
        return false;
    };
    env.is_standalone_display() || env.is_ios_standalone() || env.launched_from_android_app()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const EDGE_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const FIREFOX_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn env(display_mode: DisplayMode, user_agent: &str) -> BrowserEnvironment {
        BrowserEnvironment {
            display_mode,
            user_agent: user_agent.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_browser_is_not_installed() {
        assert!(!is_installed(None));
    }

    #[test]
    fn test_standalone_display_is_installed() {
        assert!(is_installed(Some(&env(DisplayMode::Standalone, FIREFOX_UA))));
        assert!(!is_installed(Some(&env(DisplayMode::Browser, FIREFOX_UA))));
        assert!(!is_installed(Some(&env(DisplayMode::Fullscreen, FIREFOX_UA))));
    }

    #[test]
    fn test_ios_standalone_requires_ios_user_agent() {
        let mut ios = env(DisplayMode::Browser, IPHONE_UA);
        ios.navigator_standalone = Some(true);
        assert!(is_installed(Some(&ios)));

        let mut desktop = env(DisplayMode::Browser, FIREFOX_UA);
        desktop.navigator_standalone = Some(true);
        assert!(!is_installed(Some(&desktop)));

        ios.navigator_standalone = Some(false);
        assert!(!is_installed(Some(&ios)));
    }

    #[test]
    fn test_android_app_referrer_is_installed() {
        let mut android = env(DisplayMode::Browser, ANDROID_UA);
        android.referrer = "android-app://com.example.llm_explorer/".to_string();
        assert!(is_installed(Some(&android)));
    }

    #[test]
    fn test_platform_from_user_agent() {
        assert_eq!(Platform::from_user_agent(IPHONE_UA), Platform::Ios);
        assert_eq!(Platform::from_user_agent(ANDROID_UA), Platform::Android);
        assert_eq!(Platform::from_user_agent(EDGE_UA), Platform::DesktopEdge);
        assert_eq!(Platform::from_user_agent(FIREFOX_UA), Platform::DesktopFirefox);
        assert_eq!(Platform::from_user_agent("curl/8.0"), Platform::Unknown);
    }

    #[test]
    fn test_display_mode_parse() {
        assert_eq!("standalone".parse::<DisplayMode>().unwrap(), DisplayMode::Standalone);
        assert_eq!("Minimal-UI".parse::<DisplayMode>().unwrap(), DisplayMode::MinimalUi);
        assert!("kiosk".parse::<DisplayMode>().is_err());
    }
}
