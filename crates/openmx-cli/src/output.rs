//! Terminal output for CLI commands.
//!
//! Uses `termcolor` for cross-platform colored output. Respects the
//! `NO_COLOR` environment variable and the `--color` flag. In JSON mode
//! every command prints one JSON document and no decoration.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
    json: bool,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice, json: bool) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
            json,
        }
    }

    /// True when commands should print JSON.
    pub fn is_json(&self) -> bool {
        self.json
    }

    fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    // ── Text mode ────────────────────────────────────────────────────

    /// Bold heading line.
    pub fn heading(&mut self, text: &str) {
        self.write_styled(text, None, true);
        self.newline();
    }

    /// Cyan label followed by a plain value.
    pub fn field(&mut self, label: &str, value: &str) {
        self.write_styled(label, Some(Color::Cyan), false);
        let _ = writeln!(self.stdout, " {}", value);
    }

    /// Plain line.
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// Green bold line.
    pub fn success(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Green), true);
        self.newline();
    }

    /// Yellow tag, then a plain rest of line.
    pub fn tagged(&mut self, tag: &str, text: &str) {
        self.write_styled(tag, Some(Color::Yellow), true);
        let _ = writeln!(self.stdout, " {}", text);
    }

    /// Newline.
    pub fn newline(&mut self) {
        let _ = writeln!(self.stdout);
    }

    // ── JSON mode ────────────────────────────────────────────────────

    /// One JSON document, pretty-printed.
    pub fn json(&mut self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => {
                let _ = writeln!(self.stdout, "{}", text);
            }
            Err(err) => self.warning(&format!("cannot encode JSON: {}", err)),
        }
    }

    /// One JSON document on a single line, for streams.
    pub fn json_line(&mut self, value: &serde_json::Value) {
        let _ = writeln!(self.stdout, "{}", value);
    }

    // ── stderr ───────────────────────────────────────────────────────

    /// Write a warning to stderr.
    pub fn warning(&mut self, text: &str) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Yellow)).set_bold(true);
        let _ = self.stderr.set_color(&spec);
        let _ = write!(self.stderr, "warning:");
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, " {}", text);
    }

    /// Flush stdout.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}
