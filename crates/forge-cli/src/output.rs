//! Dual pretty/JSON rendering, selected by the global `--json` flag.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub(crate) fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Pretty
        }
    }

    /// Serialize `value` to stdout when `--json` was passed. Returns
    /// `false` for [`OutputFormat::Pretty`] so callers fall through to
    /// their own human-readable rendering.
    pub(crate) fn print_json_or_fallthrough(self, value: &impl Serialize) -> bool {
        if self == OutputFormat::Json {
            match serde_json::to_string_pretty(value) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("failed to serialize output: {e}"),
            }
            true
        } else {
            false
        }
    }
}
