//! Runtime capability descriptor
//!
//! Discovery and dispatch both branch on where the adapter is running:
//! which platform family, and which major version of the PowerShell host
//! executes providers. Instead of sniffing ambient process state at each
//! branch point, a single immutable descriptor is built once and threaded
//! through.

/// Environment variable overriding the detected host major version.
pub const ENV_HOST_MAJOR: &str = "DSCBRIDGE_HOST_MAJOR";

/// Host major version of the modern cross-platform PowerShell.
pub const MODERN_HOST_MAJOR: u32 = 7;

/// Host major version of the legacy Windows-only PowerShell.
pub const LEGACY_HOST_MAJOR: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFamily {
    Windows,
    MacOs,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub family: PlatformFamily,
    /// Major version of the PowerShell host executing providers.
    pub host_major: u32,
}

impl RuntimeInfo {
    pub fn new(family: PlatformFamily, host_major: u32) -> Self {
        Self { family, host_major }
    }

    /// Descriptor for the current process.
    pub fn current() -> Self {
        let family = if cfg!(windows) {
            PlatformFamily::Windows
        } else if cfg!(target_os = "macos") {
            PlatformFamily::MacOs
        } else {
            PlatformFamily::Linux
        };

        let host_major = std::env::var(ENV_HOST_MAJOR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MODERN_HOST_MAJOR);

        Self { family, host_major }
    }

    pub fn is_windows(&self) -> bool {
        self.family == PlatformFamily::Windows
    }

    /// Whether this host can load legacy platform-shipped resources.
    pub fn supports_legacy_resources(&self) -> bool {
        self.is_windows() && self.host_major == LEGACY_HOST_MAJOR
    }
}
