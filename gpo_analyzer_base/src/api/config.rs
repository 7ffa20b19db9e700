//! # Analyzer Configuration

use gpo_decoders::config::compile_time::batch_processing::MAX_WORKER_THREADS;
use gpo_decoders::config::runtime::DecoderPreferences;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable names read by [`AnalyzerConfig::default`]
pub mod env_vars {
    pub const MAX_THREADS: &str = "GPO_MAX_THREADS";
    pub const RULES_DIR: &str = "GPO_RULES_DIR";
}

/// Kinds of settings an analysis run looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Group,
    Registry,
    Privilege,
    GppPassword,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Group,
        ObjectKind::Registry,
        ObjectKind::Privilege,
        ObjectKind::GppPassword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Group => "group",
            ObjectKind::Registry => "registry",
            ObjectKind::Privilege => "privilege",
            ObjectKind::GppPassword => "gpppassword",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown object kind '{}'", s))
    }
}

/// Selected object kinds; an empty filter selects everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFilter(BTreeSet<ObjectKind>);

impl ObjectFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(kinds: impl IntoIterator<Item = ObjectKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn includes(&self, kind: ObjectKind) -> bool {
        self.0.is_empty() || self.0.contains(&kind)
    }
}

/// Configuration for an analysis run
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Worker threads per domain, capped by the build-time ceiling
    pub max_threads: usize,

    /// Directory with `groups.toml`, `registry.toml` and `privilege_rights.toml`
    pub rules_dir: Option<PathBuf>,

    pub objects: ObjectFilter,

    /// Attach affected container names to each GPO report
    pub include_affected: bool,

    pub decoder: DecoderPreferences,
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let max_threads = env::var(env_vars::MAX_THREADS)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(default_threads)
            .min(MAX_WORKER_THREADS);

        Self {
            max_threads,
            rules_dir: env::var(env_vars::RULES_DIR).ok().map(PathBuf::from),
            objects: ObjectFilter::all(),
            include_affected: false,
            decoder: DecoderPreferences::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Set maximum threads for batch processing
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.clamp(1, MAX_WORKER_THREADS);
        self
    }

    pub fn with_rules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rules_dir = Some(dir.into());
        self
    }

    pub fn with_objects(mut self, objects: ObjectFilter) -> Self {
        self.objects = objects;
        self
    }

    pub fn with_affected(mut self, include: bool) -> Self {
        self.include_affected = include;
        self
    }

    pub fn with_decoder_preferences(mut self, prefs: DecoderPreferences) -> Self {
        self.decoder = prefs;
        self
    }
}
