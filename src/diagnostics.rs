use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString};

use crate::document::SourceFile;
use crate::locator;

/// A pre-emit diagnostic as the predicates see it: byte span plus numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: u32,
    pub start: usize,
    pub length: usize,
    pub message_text: String,
}

impl Diagnostic {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Whether the diagnostic span fully covers `range`.
    pub fn covers(&self, range: &Range<usize>) -> bool {
        self.start <= range.start && self.end() >= range.end
    }

    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        self.start <= range.end && range.start <= self.end()
    }

    /// Converts a client diagnostic. Diagnostics without a numeric code are dropped.
    pub fn from_lsp(diagnostic: &lsp_types::Diagnostic, file: &SourceFile) -> Option<Self> {
        let code = parse_code(diagnostic.code.as_ref()?)?;
        let start = file.position_to_offset(diagnostic.range.start);
        let end = file.position_to_offset(diagnostic.range.end).max(start);
        Some(Self {
            code,
            start,
            length: end - start,
            message_text: diagnostic.message.clone(),
        })
    }

    pub fn to_lsp(&self, file: &SourceFile) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: lsp_types::Range::new(
                file.offset_to_position(self.start),
                file.offset_to_position(self.end()),
            ),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("ts".to_string()),
            code: Some(NumberOrString::String(format!("TS{}", self.code))),
            code_description: None,
            message: self.message_text.clone(),
            related_information: None,
            tags: None,
            data: None,
        }
    }
}

/// `2540`, `"2540"` and `"TS2540"` all name the same diagnostic.
pub fn parse_code(code: &NumberOrString) -> Option<u32> {
    match code {
        NumberOrString::Number(n) => u32::try_from(*n).ok(),
        NumberOrString::String(s) => s.trim_start_matches("TS").parse().ok(),
    }
}

/// One line of `tsc --pretty false` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TscDiagnostic {
    pub path: PathBuf,
    /// 1-indexed
    pub line: u32,
    /// 1-indexed, UTF-16 units
    pub column: u32,
    pub code: u32,
    pub message: String,
}

impl TscDiagnostic {
    /// tsc only reports a start position; the span is the token found there.
    pub fn to_diagnostic(&self, file: &SourceFile) -> Diagnostic {
        let start = file.position_to_offset(lsp_types::Position::new(
            self.line.saturating_sub(1),
            self.column.saturating_sub(1),
        ));
        let length = locator::find_containing(file.root(), start..start)
            .filter(|node| node.start_byte() == start)
            .map(|node| node.end_byte() - start)
            .unwrap_or(0);
        Diagnostic {
            code: self.code,
            start,
            length,
            message_text: self.message.clone(),
        }
    }
}

fn parse_tsc_line(line: &str, root: &Path) -> Option<TscDiagnostic> {
    let close = line.find("): ")?;
    let open = line[..close].rfind('(')?;
    let (row, col) = line[open + 1..close].split_once(',')?;
    let rest = &line[close + 3..];
    let rest = rest
        .strip_prefix("error ")
        .or_else(|| rest.strip_prefix("warning "))?;
    let (code, message) = rest.strip_prefix("TS")?.split_once(": ")?;

    let path = Path::new(&line[..open]);
    Some(TscDiagnostic {
        path: if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        },
        line: row.trim().parse().ok()?,
        column: col.trim().parse().ok()?,
        code: code.parse().ok()?,
        message: message.to_string(),
    })
}

/// Parses tsc output. Indented continuation lines belong to the previous message.
pub fn parse_tsc_output(output: &str, root: &Path) -> Vec<TscDiagnostic> {
    let mut diagnostics: Vec<TscDiagnostic> = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(' ') {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
            continue;
        }
        match parse_tsc_line(line, root) {
            Some(diagnostic) => diagnostics.push(diagnostic),
            None => tracing::debug!("Ignoring tsc output line: {}", line),
        }
    }
    diagnostics
}

pub struct DiagnosticsProvider {
    workspace_root: Option<PathBuf>,
    tsc_command: String,
}

impl DiagnosticsProvider {
    pub fn new(tsc_command: impl Into<String>) -> Self {
        Self {
            workspace_root: None,
            tsc_command: tsc_command.into(),
        }
    }

    pub fn set_workspace_root(&mut self, root: &Path) {
        self.workspace_root = Some(root.to_path_buf());
    }

    /// Find tsconfig.json in parent directories
    fn find_workspace_root(file_path: &Path) -> Option<PathBuf> {
        let mut path = file_path.parent()?;

        loop {
            if path.join("tsconfig.json").exists() {
                return Some(path.to_path_buf());
            }

            path = path.parent()?;
        }
    }

    /// Run tsc over the project and keep the diagnostics of `file_path`
    pub fn get_diagnostics(&self, file_path: &Path) -> Vec<TscDiagnostic> {
        let workspace_root = match Self::find_workspace_root(file_path).or_else(|| self.workspace_root.clone()) {
            Some(root) => root,
            None => return vec![],
        };

        let output = Command::new(&self.tsc_command)
            .args(["--noEmit", "--pretty", "false", "-p"])
            .arg(&workspace_root)
            .current_dir(&workspace_root)
            .output();

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                tracing::error!("Failed to run {}: {}", self.tsc_command, e);
                return vec![];
            }
        };

        if output.status.success() {
            return vec![];
        }

        // tsc writes diagnostics to stdout
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_tsc_output(&stdout, &workspace_root)
            .into_iter()
            .filter(|d| d.path == file_path)
            .collect()
    }
}

impl Default for DiagnosticsProvider {
    fn default() -> Self {
        Self::new("tsc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsc_output() {
        let output = "src/a.ts(3,1): error TS2540: Cannot assign to 'a' because it is a constant.\n\
                      src/b.ts(10,15): error TS2339: Property 'bar' does not exist on type 'Foo'.\n  \
                        Did you mean 'baz'?\n\
                      Found 2 errors.\n";
        let diagnostics = parse_tsc_output(output, Path::new("/proj"));

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].path, PathBuf::from("/proj/src/a.ts"));
        assert_eq!(diagnostics[0].code, 2540);
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (3, 1));
        assert_eq!(diagnostics[1].code, 2339);
        assert!(diagnostics[1].message.ends_with("Did you mean 'baz'?"));
    }

    #[test]
    fn test_tsc_diagnostic_spans_token() {
        let file = SourceFile::parse("/proj/a.ts", "const a = 1\na = 2\n").unwrap();
        let tsc = TscDiagnostic {
            path: file.path.clone(),
            line: 2,
            column: 1,
            code: 2540,
            message: "Cannot assign to 'a' because it is a constant.".to_string(),
        };
        let diagnostic = tsc.to_diagnostic(&file);
        assert_eq!(diagnostic.start, 12);
        assert_eq!(diagnostic.length, 1);
    }

    #[test]
    fn test_lsp_codes() {
        assert_eq!(parse_code(&NumberOrString::Number(2554)), Some(2554));
        assert_eq!(parse_code(&NumberOrString::String("TS2339".to_string())), Some(2339));
        assert_eq!(parse_code(&NumberOrString::String("no-unused".to_string())), None);

        let file = SourceFile::parse("/proj/a.ts", "const a = 1\na = 2\n").unwrap();
        let lsp = Diagnostic {
            code: 2540,
            start: 12,
            length: 1,
            message_text: "x".to_string(),
        }
        .to_lsp(&file);
        assert_eq!(lsp.range.start, lsp_types::Position::new(1, 0));
        assert_eq!(Diagnostic::from_lsp(&lsp, &file).unwrap().start, 12);
    }
}
