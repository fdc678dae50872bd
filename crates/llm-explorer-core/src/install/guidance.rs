use std::fmt;

use super::Platform;

/// Steps for installing by hand when no install prompt is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualInstructions {
    pub platform: Platform,
    pub steps: Vec<&'static str>,
}

const IOS_STEP: &str = "On iOS (Safari): tap the Share button, then \"Add to Home Screen\"";
const ANDROID_STEP: &str = "On Android (Chrome): tap the menu button, then \"Add to Home Screen\"";
const CHROME_STEP: &str = "Chrome: click the install icon in the address bar";
const EDGE_STEP: &str = "Edge: click the install icon in the address bar";
const FIREFOX_STEP: &str = "Firefox: click the menu button, then \"Install app\"";
const CONFIRM_STEP: &str = "Confirm the name and tap \"Add\"";
const LAUNCH_MOBILE_STEP: &str = "Open the app from your home screen like any other app";
const LAUNCH_DESKTOP_STEP: &str = "Open the app from your desktop or start menu";

impl ManualInstructions {
    pub fn for_platform(platform: Platform) -> Self {
        let steps = match platform {
            Platform::Ios => vec![IOS_STEP, CONFIRM_STEP, LAUNCH_MOBILE_STEP],
            Platform::Android => vec![ANDROID_STEP, CONFIRM_STEP, LAUNCH_MOBILE_STEP],
            Platform::DesktopChrome => vec![CHROME_STEP, LAUNCH_DESKTOP_STEP],
            Platform::DesktopEdge => vec![EDGE_STEP, LAUNCH_DESKTOP_STEP],
            Platform::DesktopFirefox => vec![FIREFOX_STEP, LAUNCH_DESKTOP_STEP],
            Platform::Unknown => vec![
                IOS_STEP,
                ANDROID_STEP,
                CHROME_STEP,
                EDGE_STEP,
                FIREFOX_STEP,
            ],
        };
        Self { platform, steps }
    }
}

impl fmt::Display for ManualInstructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "To install LLM Explorer:")?;
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        Ok(())
    }
}
