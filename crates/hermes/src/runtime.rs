//! Managed host detection.

use std::env;
use std::fmt;
use std::path::Path;

use hermes_config::RuntimeConfig;

use crate::adapter::AdapterKind;

/// The managed host this process runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    /// Node.js.
    Node,
    /// Bun.
    Bun,
    /// Deno.
    Deno,
    /// None of the known hosts.
    Unknown,
}

impl Runtime {
    /// Detects the runtime for this process.
    ///
    /// A configured override wins; otherwise the executable name decides.
    #[must_use]
    pub fn detect(config: &RuntimeConfig) -> Self {
        let exe = env::current_exe().ok();
        let stem = exe.as_deref().and_then(executable_stem);
        Self::detect_from(config.force.as_deref(), stem.as_deref())
    }

    /// Detection from explicit probe inputs.
    #[must_use]
    pub fn detect_from(force: Option<&str>, exe_stem: Option<&str>) -> Self {
        if let Some(runtime) = force.and_then(Self::from_name) {
            return runtime;
        }
        exe_stem
            .and_then(Self::from_name)
            .unwrap_or(Self::Unknown)
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "node" | "nodejs" => Some(Self::Node),
            "bun" => Some(Self::Bun),
            "deno" => Some(Self::Deno),
            _ => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Bun => "bun",
            Self::Deno => "deno",
            Self::Unknown => "unknown",
        }
    }

    /// The interop strategy used under this runtime.
    ///
    /// Deno loads the engine as a shared library through its FFI; every other
    /// host, including an unrecognized one, links it in-process.
    #[must_use]
    pub const fn adapter_kind(self) -> AdapterKind {
        match self {
            Self::Deno => AdapterKind::Dylib,
            Self::Node | Self::Bun | Self::Unknown => AdapterKind::InProcess,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn executable_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_ascii_lowercase)
}
