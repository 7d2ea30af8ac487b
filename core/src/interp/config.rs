use std::env;

use tracing::warn;

pub const DEFAULT_MEGAMORPHIC_THRESHOLD: u32 = 8;
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Native stack reserved per nested interpreter frame. One IR-level call passes through
/// `run_frame`, `execute`, `step` and a call helper; debug builds need the headroom.
pub const STACK_BYTES_PER_FRAME: usize = 64 * 1024;
const BASE_STACK_BYTES: usize = 1024 * 1024;

/// Interpreter knobs. `Default` gives the production setup; `from_env` layers the
/// `IRK_*` environment variables on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpConfig {
    /// When false every dispatch site starts (and stays) generic.
    pub inline_cache: bool,
    /// Call-target changes a site tolerates before going generic for good.
    pub megamorphic_threshold: u32,
    /// Nested frame limit; exceeding it raises `SystemStackError`.
    pub max_depth: usize,
    /// Emit a `trace!` event per executed instruction.
    pub trace_instructions: bool,
}

impl Default for InterpConfig {
    fn default() -> Self {
        Self {
            inline_cache: true,
            megamorphic_threshold: DEFAULT_MEGAMORPHIC_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
            trace_instructions: false,
        }
    }
}

/// Whether an `IRK_*` switch is on: anything except empty, `0`, `false` or `off`.
pub fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    !(trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("0")
        || trimmed.eq_ignore_ascii_case("false")
        || trimmed.eq_ignore_ascii_case("off"))
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(target: "irk::config", var = name, value = raw, "ignoring unparsable value");
            None
        }
    }
}

impl InterpConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("IRK_INLINE_CACHE") {
            config.inline_cache = env_toggle_enabled(&raw);
        }
        if let Some(n) = lookup("IRK_MEGAMORPHIC_THRESHOLD")
            .and_then(|raw| parse_number("IRK_MEGAMORPHIC_THRESHOLD", &raw))
        {
            config.megamorphic_threshold = n;
        }
        if let Some(n) = lookup("IRK_MAX_DEPTH").and_then(|raw| parse_number("IRK_MAX_DEPTH", &raw)) {
            config.max_depth = n;
        }
        if let Some(raw) = lookup("IRK_TRACE_INSTRUCTIONS") {
            config.trace_instructions = env_toggle_enabled(&raw);
        }
        config
    }

    pub fn with_inline_cache(mut self, enabled: bool) -> Self {
        self.inline_cache = enabled;
        self
    }

    pub fn with_megamorphic_threshold(mut self, threshold: u32) -> Self {
        self.megamorphic_threshold = threshold;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_trace_instructions(mut self, enabled: bool) -> Self {
        self.trace_instructions = enabled;
        self
    }

    /// Stack size for threads that run an interpreter, large enough that `max_depth`
    /// trips before the native stack does.
    pub fn stack_size(&self) -> usize {
        self.max_depth
            .saturating_mul(STACK_BYTES_PER_FRAME)
            .saturating_add(BASE_STACK_BYTES)
    }
}
