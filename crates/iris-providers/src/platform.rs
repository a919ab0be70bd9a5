//! Host platform detection.
//!
//! Produces the descriptor the factory uses to select backends. Detection
//! runs once at startup; nothing here is re-probed per call.

use std::collections::BTreeMap;

use serde::Serialize;

/// Enumerates supported `OsFamily` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Macos,
    Windows,
    Other,
}

impl OsFamily {
    pub fn name(self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Macos => "macos",
            OsFamily::Windows => "windows",
            OsFamily::Other => "other",
        }
    }

    fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::Macos,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }
}

/// Enumerates supported `DisplayServer` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayServer {
    X11,
    Wayland,
}

impl DisplayServer {
    pub fn name(self) -> &'static str {
        match self {
            DisplayServer::X11 => "x11",
            DisplayServer::Wayland => "wayland",
        }
    }
}

/// Host description produced once at startup and consumed by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformDescriptor {
    pub os: OsFamily,
    pub display_server: Option<DisplayServer>,
    pub is_wsl: bool,
}

impl PlatformDescriptor {
    /// Descriptor for a host without any display. Used for headless serving
    /// and as a test fixture.
    pub fn headless() -> Self {
        Self {
            os: OsFamily::current(),
            display_server: None,
            is_wsl: false,
        }
    }

    /// Descriptor for an X11 host. Primarily a test fixture; production code
    /// goes through [`detect_platform`].
    pub fn x11() -> Self {
        Self {
            os: OsFamily::Linux,
            display_server: Some(DisplayServer::X11),
            is_wsl: false,
        }
    }

    pub fn display_available(&self) -> bool {
        self.display_server.is_some()
    }
}

/// Detects the current host from the process environment.
pub fn detect_platform() -> PlatformDescriptor {
    let mut env = BTreeMap::new();
    for key in ["DISPLAY", "WAYLAND_DISPLAY"] {
        if let Ok(value) = std::env::var(key) {
            env.insert(key.to_string(), value);
        }
    }
    let proc_version = std::fs::read_to_string("/proc/version").unwrap_or_default();
    detect_platform_from(OsFamily::current(), &env, &proc_version)
}

/// Pure detection core, separated so tests can drive it without touching the
/// process environment.
pub fn detect_platform_from(
    os: OsFamily,
    env: &BTreeMap<String, String>,
    proc_version: &str,
) -> PlatformDescriptor {
    let has_env = |key: &str| env.get(key).map(|value| !value.is_empty()).unwrap_or(false);

    // X11 wins over Wayland when both are set: the input bridge only speaks
    // X11, and XWayland makes DISPLAY usable on Wayland sessions.
    let display_server = if has_env("DISPLAY") {
        Some(DisplayServer::X11)
    } else if has_env("WAYLAND_DISPLAY") {
        Some(DisplayServer::Wayland)
    } else {
        None
    };

    let lowered = proc_version.to_lowercase();
    let is_wsl = lowered.contains("microsoft") || lowered.contains("wsl");

    PlatformDescriptor {
        os,
        display_server,
        is_wsl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn unit_display_env_selects_x11() {
        let descriptor = detect_platform_from(OsFamily::Linux, &env(&[("DISPLAY", ":0")]), "");
        assert_eq!(descriptor.display_server, Some(DisplayServer::X11));
        assert!(descriptor.display_available());
    }

    #[test]
    fn unit_wayland_env_without_display_selects_wayland() {
        let descriptor =
            detect_platform_from(OsFamily::Linux, &env(&[("WAYLAND_DISPLAY", "wayland-0")]), "");
        assert_eq!(descriptor.display_server, Some(DisplayServer::Wayland));
    }

    #[test]
    fn unit_x11_wins_when_both_display_vars_are_set() {
        let descriptor = detect_platform_from(
            OsFamily::Linux,
            &env(&[("DISPLAY", ":0"), ("WAYLAND_DISPLAY", "wayland-0")]),
            "",
        );
        assert_eq!(descriptor.display_server, Some(DisplayServer::X11));
    }

    #[test]
    fn unit_empty_display_var_counts_as_absent() {
        let descriptor = detect_platform_from(OsFamily::Linux, &env(&[("DISPLAY", "")]), "");
        assert_eq!(descriptor.display_server, None);
        assert!(!descriptor.display_available());
    }

    #[test]
    fn unit_proc_version_flags_wsl() {
        let descriptor = detect_platform_from(
            OsFamily::Linux,
            &env(&[]),
            "Linux version 5.15.90.1-microsoft-standard-WSL2",
        );
        assert!(descriptor.is_wsl);
    }
}
