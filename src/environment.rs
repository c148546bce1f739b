//! Environment fingerprint
//!
//! The first emission of a page view carries a one-time description of the
//! visitor's browser. Probes compute it on demand; `None` means detection
//! failed and the emission goes out without it.

use crate::record::EnvironmentSnapshot;

/// Source of the one-time environment snapshot
pub trait EnvironmentProbe {
    fn detect(&self) -> Option<EnvironmentSnapshot>;
}

/// A probe that always returns the same answer
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment(pub Option<EnvironmentSnapshot>);

impl EnvironmentProbe for StaticEnvironment {
    fn detect(&self) -> Option<EnvironmentSnapshot> {
        self.0.clone()
    }
}

/// Lower-cased substrings that mark automated agents
const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "crawling",
    "spider",
    "slurp",
    "facebookexternalhit",
    "feedburner",
    "pingdom",
];

/// `(browser name, token preceding the version)`, checked in order. Engines
/// that embed another engine's token must come before it.
const BROWSER_RULES: &[(&str, &str)] = &[
    ("edge-chromium", "Edg/"),
    ("edge", "Edge/"),
    ("opera", "OPR/"),
    ("samsung", "SamsungBrowser/"),
    ("crios", "CriOS/"),
    ("fxios", "FxiOS/"),
    ("firefox", "Firefox/"),
    ("chrome", "Chrome/"),
];

/// `(os family, marker)`, checked in order
const OS_RULES: &[(&str, &str)] = &[
    ("iOS", "iPhone"),
    ("iOS", "iPad"),
    ("iOS", "iPod"),
    ("Android OS", "Android"),
    ("Windows 10", "Windows NT 10.0"),
    ("Windows 8.1", "Windows NT 6.3"),
    ("Windows 8", "Windows NT 6.2"),
    ("Windows 7", "Windows NT 6.1"),
    ("Windows Vista", "Windows NT 6.0"),
    ("Windows XP", "Windows NT 5.1"),
    ("Chrome OS", "CrOS"),
    ("Mac OS", "Mac OS X"),
    ("Mac OS", "Macintosh"),
    ("Linux", "Linux"),
    ("Linux", "X11"),
];

/// Detects the browser from a user-agent string
#[derive(Debug, Clone)]
pub struct UserAgentProbe {
    user_agent: String,
    referrer: Option<String>,
}

impl UserAgentProbe {
    /// An empty referrer is treated as no referrer
    pub fn new(user_agent: impl Into<String>, referrer: Option<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            referrer: referrer.filter(|r| !r.is_empty()),
        }
    }
}

impl EnvironmentProbe for UserAgentProbe {
    fn detect(&self) -> Option<EnvironmentSnapshot> {
        let ua = self.user_agent.as_str();
        let lowered = ua.to_lowercase();

        if BOT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Some(EnvironmentSnapshot {
                browser_name: "bot".to_string(),
                os: None,
                browser_type: "bot".to_string(),
                browser_version: None,
                referrer: self.referrer.clone(),
            });
        }

        let (name, version) = detect_browser(ua)?;
        Some(EnvironmentSnapshot {
            browser_name: name.to_string(),
            os: detect_os(ua).map(str::to_string),
            browser_type: "browser".to_string(),
            browser_version: version,
            referrer: self.referrer.clone(),
        })
    }
}

fn detect_browser(ua: &str) -> Option<(&'static str, Option<String>)> {
    for (name, token) in BROWSER_RULES {
        if ua.contains(token) {
            return Some((*name, version_after(ua, token)));
        }
    }

    if ua.contains("Safari/") && ua.contains("Version/") {
        let mobile_apple = ["iPhone", "iPad", "iPod"].iter().any(|d| ua.contains(d));
        let name = if mobile_apple { "ios" } else { "safari" };
        return Some((name, version_after(ua, "Version/")));
    }

    if ua.contains("Trident/") {
        return Some(("ie", version_after(ua, "rv:")));
    }
    if ua.contains("MSIE ") {
        return Some(("ie", version_after(ua, "MSIE ")));
    }

    None
}

fn detect_os(ua: &str) -> Option<&'static str> {
    OS_RULES
        .iter()
        .find(|(_, marker)| ua.contains(marker))
        .map(|(os, _)| *os)
}

/// Version digits following `token`, normalised to three components
fn version_after(ua: &str, token: &str) -> Option<String> {
    let start = ua.find(token)? + token.len();
    let raw: String = ua[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '_')
        .collect();

    let mut parts: Vec<&str> = raw
        .split(|c: char| c == '.' || c == '_')
        .filter(|p| !p.is_empty())
        .take(3)
        .collect();
    if parts.is_empty() {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Some(parts.join("."))
}
