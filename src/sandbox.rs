use std::path::{Path, PathBuf};

use once_cell::sync::{Lazy, OnceCell};

/// The file Flatpak places at the root of every sandbox.
pub const FLATPAK_INFO: &str = "/.flatpak-info";

static PROCESS_PROBE: Lazy<SandboxProbe> = Lazy::new(|| SandboxProbe::new(FLATPAK_INFO));

/// How requests reach the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// Call the daemon directly on the session bus.
    Native,
    /// Go through `org.freedesktop.portal.GameMode`, the daemon isn't
    /// reachable from inside the sandbox.
    Portal,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Portal => f.write_str("portal"),
        }
    }
}

/// Decides once whether the process runs inside a sandbox.
///
/// The answer is cached on first use and never re-evaluated, the sandbox
/// status of a running process can't change.
#[derive(Debug)]
pub struct SandboxProbe {
    marker: PathBuf,
    mode: OnceCell<TransportMode>,
}

impl SandboxProbe {
    /// A probe looking at `marker` instead of [`FLATPAK_INFO`].
    pub fn new(marker: impl AsRef<Path>) -> Self {
        Self {
            marker: marker.as_ref().to_owned(),
            mode: OnceCell::new(),
        }
    }

    /// The transport to use, computed on the first call.
    pub fn mode(&self) -> TransportMode {
        *self.mode.get_or_init(|| {
            let mode = if is_marker_present(&self.marker) {
                TransportMode::Portal
            } else {
                TransportMode::Native
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Selected the {} transport ({} checked)",
                mode,
                self.marker.display()
            );
            mode
        })
    }
}

/// The marker counts if it is a regular file, readable and non-empty.
fn is_marker_present(marker: &Path) -> bool {
    std::fs::File::open(marker)
        .and_then(|file| file.metadata())
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Select the transport for this process.
///
/// Checks [`FLATPAK_INFO`] the first time it is called and returns the same
/// answer for the rest of the process lifetime.
pub fn select_transport() -> TransportMode {
    PROCESS_PROBE.mode()
}

/// Check whether the application is running inside a sandbox.
pub fn is_sandboxed() -> bool {
    select_transport() == TransportMode::Portal
}
