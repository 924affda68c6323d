//! Operating system family detection

use serde::Serialize;

/// Operating system family the resolver is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Windows,
    #[serde(rename = "macos")]
    MacOS,
    Linux,
    Unknown,
}

impl PlatformKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformKind::Windows => "windows",
            PlatformKind::MacOS => "macos",
            PlatformKind::Linux => "linux",
            PlatformKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the platform this binary was compiled for.
pub fn detect() -> PlatformKind {
    if cfg!(target_os = "windows") {
        PlatformKind::Windows
    } else if cfg!(target_os = "macos") {
        PlatformKind::MacOS
    } else if cfg!(target_os = "linux") {
        PlatformKind::Linux
    } else {
        PlatformKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_deterministic() {
        assert_eq!(detect(), detect());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_detect_linux() {
        assert_eq!(detect(), PlatformKind::Linux);
    }

    #[test]
    fn test_display_matches_serde() {
        for platform in [PlatformKind::Windows, PlatformKind::MacOS, PlatformKind::Linux, PlatformKind::Unknown] {
            let json = serde_json::to_value(platform).unwrap();
            assert_eq!(json, platform.to_string());
        }
    }
}
