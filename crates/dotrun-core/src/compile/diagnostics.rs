//! Compiler diagnostics and their mapping back to the submitted source.

use std::fmt;
use std::path::{Path, PathBuf};

/// Logical file name diagnostics are reported against.
pub const LOGICAL_SOURCE_NAME: &str = "Program.cs";

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A location in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path
    pub file: PathBuf,

    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

/// A compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Diagnostic code (e.g., "CS0103")
    pub code: Option<String>,

    pub message: String,

    /// Primary source location
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// An error with just a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            location: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format the diagnostic for terminal display.
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        let level_str = match self.severity {
            Severity::Error => "\x1b[1;31merror\x1b[0m",
            Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            Severity::Info => "\x1b[1;36minfo\x1b[0m",
        };

        if let Some(code) = &self.code {
            output.push_str(&format!("{level_str}[{code}]: {}\n", self.message));
        } else {
            output.push_str(&format!("{level_str}: {}\n", self.message));
        }

        if let Some(loc) = &self.location {
            output.push_str(&format!(
                "  \x1b[1;34m-->\x1b[0m {}:{}:{}\n",
                loc.file.display(),
                loc.line,
                loc.column
            ));
        }

        output
    }

    /// Format the diagnostic for JSON output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "code": self.code,
            "severity": self.severity.to_string(),
            "location": self.location.as_ref().map(|loc| {
                serde_json::json!({
                    "file": loc.file.display().to_string(),
                    "line": loc.line,
                    "column": loc.column,
                })
            }),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}({},{}): ", loc.file.display(), loc.line, loc.column)?;
        }
        write!(f, "{}", self.severity)?;
        if let Some(code) = &self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Parses compiler output and re-points locations at the logical source.
pub struct DiagnosticMapper {
    logical_file: PathBuf,
}

impl Default for DiagnosticMapper {
    fn default() -> Self {
        Self::new(LOGICAL_SOURCE_NAME)
    }
}

impl DiagnosticMapper {
    pub fn new(logical_file: impl Into<PathBuf>) -> Self {
        Self {
            logical_file: logical_file.into(),
        }
    }

    pub fn logical_file(&self) -> &Path {
        &self.logical_file
    }

    /// Parse every diagnostic line in compiler output, in order.
    ///
    /// Lines that are not diagnostics (banners, summaries) are skipped.
    pub fn parse_output(&self, output: &str) -> Vec<Diagnostic> {
        output
            .lines()
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    /// Parse one line of the form
    /// `path(line,col): error CS0103: message [project]`.
    pub fn parse_line(&self, line: &str) -> Option<Diagnostic> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        for (keyword, severity) in [
            ("error", Severity::Error),
            ("warning", Severity::Warning),
            ("info", Severity::Info),
        ] {
            let Some((prefix, rest)) = split_at_severity(line, keyword) else {
                continue;
            };

            let (code, message) = match rest.split_once(':') {
                Some((code, message)) if is_code(code.trim()) => {
                    (Some(code.trim().to_string()), message.trim())
                }
                _ => (None, rest.trim_start_matches(':').trim()),
            };

            return Some(Diagnostic {
                severity,
                code,
                message: strip_project_suffix(message).to_string(),
                location: prefix.and_then(|p| self.parse_location(p)),
            });
        }

        tracing::trace!("Not a diagnostic line: {}", line);
        None
    }

    /// `path(line,col)` or `path(line,col,endline,endcol)`.
    fn parse_location(&self, prefix: &str) -> Option<SourceLocation> {
        let prefix = prefix.trim();
        let open = prefix.rfind('(')?;
        let coords = prefix[open + 1..].strip_suffix(')')?;
        let mut parts = coords.split(',').map(|p| p.trim().parse::<usize>());

        let line = parts.next()?.ok()?;
        let column = parts.next().and_then(|c| c.ok()).unwrap_or(1);

        Some(SourceLocation {
            file: self.logical_file.clone(),
            line,
            column,
        })
    }
}

/// Split `"<prefix>: <keyword> <rest>"` or `"<keyword> <rest>"`.
fn split_at_severity<'a>(line: &'a str, keyword: &str) -> Option<(Option<&'a str>, &'a str)> {
    if let Some(rest) = line.strip_prefix(keyword) {
        if rest.starts_with(' ') || rest.starts_with(':') {
            return Some((None, rest.trim_start()));
        }
    }

    let marker = format!(": {} ", keyword);
    let idx = line.find(&marker)?;
    Some((Some(&line[..idx]), &line[idx + marker.len()..]))
}

/// Diagnostic codes are an uppercase prefix followed by digits (CS0103, NU1101).
fn is_code(token: &str) -> bool {
    let digits = token.trim_start_matches(|c: char| c.is_ascii_uppercase());
    digits.len() < token.len() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// MSBuild appends ` [/path/to/project.csproj]` to each diagnostic.
fn strip_project_suffix(message: &str) -> &str {
    if message.ends_with(']') {
        if let Some(idx) = message.rfind(" [") {
            return message[..idx].trim_end();
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_located_error() {
        let mapper = DiagnosticMapper::default();
        let diag = mapper
            .parse_line(
                "/tmp/dotrun-1234/src.cs(5,13): error CS0103: The name 'foo' does not exist in the current context",
            )
            .unwrap();

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("CS0103"));
        assert!(diag.message.starts_with("The name 'foo'"));
        let loc = diag.location.unwrap();
        assert_eq!(loc.file, PathBuf::from("Program.cs"));
        assert_eq!((loc.line, loc.column), (5, 13));
    }

    #[test]
    fn test_parse_unlocated_error() {
        let mapper = DiagnosticMapper::default();
        let diag = mapper
            .parse_line("error CS5001: Program does not contain a static 'Main' method suitable for an entry point")
            .unwrap();
        assert_eq!(diag.code.as_deref(), Some("CS5001"));
        assert!(diag.location.is_none());
    }

    #[test]
    fn test_parse_warning_with_project_suffix() {
        let mapper = DiagnosticMapper::default();
        let diag = mapper
            .parse_line(
                r"C:\work\Program.cs(3,9,3,20): warning CS0168: The variable 'x' is declared but never used [C:\work\App.csproj]",
            )
            .unwrap();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "The variable 'x' is declared but never used");
        assert_eq!(diag.location.unwrap().line, 3);
    }

    #[test]
    fn test_skips_noise() {
        let output = "\
Microsoft (R) Visual C# Compiler version 4.8.0
Copyright (C) Microsoft Corporation. All rights reserved.

Program.cs(1,1): error CS1022: Type or namespace definition, or end-of-file expected
";
        let diags = DiagnosticMapper::default().parse_output(output);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code.as_deref(), Some("CS1022"));
    }

    #[test]
    fn test_is_code() {
        assert!(is_code("CS0103"));
        assert!(is_code("NU1101"));
        assert!(!is_code("CS"));
        assert!(!is_code("0103"));
        assert!(!is_code("The name"));
    }

    #[test]
    fn test_format_terminal() {
        let diag = Diagnostic {
            severity: Severity::Error,
            code: Some("CS0103".to_string()),
            message: "missing name".to_string(),
            location: Some(SourceLocation {
                file: PathBuf::from("Program.cs"),
                line: 10,
                column: 5,
            }),
        };

        let formatted = diag.format_terminal();
        assert!(formatted.contains("CS0103"));
        assert!(formatted.contains("Program.cs:10:5"));
        assert_eq!(diag.to_string(), "Program.cs(10,5): error CS0103: missing name");
        assert_eq!(diag.to_json()["severity"], "error");
    }
}
