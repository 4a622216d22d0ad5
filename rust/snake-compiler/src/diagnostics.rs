//! Error diagnostics with source snippets and colors.

use crate::compiler::lexer::{DesnakeError, LexError};
use crate::compiler::parser::ParseError;
use crate::CompileError;

/// A rendered diagnostic with source context
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub source_line: Option<String>,
    pub underline: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Render with ANSI colors for terminal
    pub fn render_ansi(&self) -> String {
        let mut out = format!("{}[{}]: {}\n", red("error"), bold(self.code), bold(&self.message));

        if let (Some(file), Some(line)) = (&self.file, self.line) {
            let col = self.col.map(|c| format!(":{}", c)).unwrap_or_default();
            out.push_str(&format!("  {} {}:{}{}\n", cyan("-->"), file, line, col));
        }

        if let (Some(line_num), Some(line_text), Some(underline)) =
            (self.line, &self.source_line, &self.underline)
        {
            out.push_str(&format!("   {}\n", cyan("|")));
            out.push_str(&format!(
                "{:>3} {} {}\n",
                cyan(&line_num.to_string()),
                cyan("|"),
                line_text
            ));
            out.push_str(&format!("   {} {}\n", cyan("|"), red(underline)));
        }

        for suggestion in &self.suggestions {
            out.push_str(&format!("   {} {}: {}\n", cyan("="), cyan("help"), suggestion));
        }
        out
    }

    /// Render without colors (for tests and non-terminal output)
    pub fn render_plain(&self) -> String {
        let mut out = format!("error[{}]: {}\n", self.code, self.message);

        if let (Some(file), Some(line)) = (&self.file, self.line) {
            let col = self.col.map(|c| format!(":{}", c)).unwrap_or_default();
            out.push_str(&format!("  --> {}:{}{}\n", file, line, col));
        }

        if let (Some(line_num), Some(line_text), Some(underline)) =
            (self.line, &self.source_line, &self.underline)
        {
            out.push_str("   |\n");
            out.push_str(&format!("{:>3} | {}\n", line_num, line_text));
            out.push_str(&format!("   | {}\n", underline));
        }

        for suggestion in &self.suggestions {
            out.push_str(&format!("   = help: {}\n", suggestion));
        }
        out
    }
}

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

fn get_source_line(source: &str, line: usize) -> Option<String> {
    source
        .lines()
        .nth(line.saturating_sub(1))
        .map(|s| s.to_string())
}

fn make_underline(col: usize, len: usize) -> String {
    format!(
        "{}{}",
        " ".repeat(col.saturating_sub(1)),
        "^".repeat(len.max(1))
    )
}

fn located(
    code: &'static str,
    message: String,
    source: &str,
    filename: &str,
    line: usize,
    col: usize,
    width: usize,
) -> Diagnostic {
    let source_line = get_source_line(source, line);
    let underline = source_line.as_ref().map(|_| make_underline(col, width));
    Diagnostic {
        code,
        message,
        file: Some(filename.to_string()),
        line: Some(line),
        col: Some(col),
        source_line,
        underline,
        suggestions: vec![],
    }
}

/// Convert a CompileError + source text into a Diagnostic.
///
/// Lex and parse positions refer to the desnaked text, so `source` should be
/// the desnaked program for those. Desnake errors point at the raw file line.
pub fn format_compile_error(error: &CompileError, source: &str, filename: &str) -> Diagnostic {
    match error {
        CompileError::Desnake(e) => format_desnake_error(e, source, filename),
        CompileError::Lex(e) => format_lex_error(e, source, filename),
        CompileError::Parse(e) => format_parse_error(e, source, filename),
        CompileError::NotALiteral { found } => Diagnostic {
            code: "E020",
            message: format!("expected a single literal value, found {}", found),
            file: Some(filename.to_string()),
            line: None,
            col: None,
            source_line: None,
            underline: None,
            suggestions: vec![],
        },
    }
}

/// Plain-text rendering of a compile error.
pub fn format_error(error: &CompileError, source: &str, filename: &str) -> String {
    format_compile_error(error, source, filename).render_plain()
}

fn format_desnake_error(error: &DesnakeError, source: &str, filename: &str) -> Diagnostic {
    let mut diag = located(
        "E001",
        format!(
            "line is {} characters wide, expected {}",
            error.found, error.expected
        ),
        source,
        filename,
        error.line,
        1,
        error.found,
    );
    diag.suggestions
        .push("pad every line to exactly 80 characters; only a final empty line may be shorter".into());
    diag
}

fn format_lex_error(error: &LexError, source: &str, filename: &str) -> Diagnostic {
    match error {
        LexError::UnexpectedChar { ch, line, col } => {
            let mut diag = located(
                "E002",
                format!("unexpected character '{}'", ch),
                source,
                filename,
                *line,
                *col,
                1,
            );
            match ch {
                '<' => diag
                    .suggestions
                    .push("'<<' returns from a function and '<>' swaps; '>' is the type arrow".into()),
                '!' => diag.suggestions.push("'!?' parses a string as a value".into()),
                '"' => diag.suggestions.push("strings are quoted with single quotes".into()),
                _ => {}
            }
            diag
        }
        LexError::UnterminatedLiteral { line, col } => {
            let width = get_source_line(source, *line)
                .map(|l| l.chars().count().saturating_sub(col - 1))
                .unwrap_or(1);
            let mut diag = located(
                "E003",
                "unterminated character or string literal".to_string(),
                source,
                filename,
                *line,
                *col,
                width,
            );
            diag.suggestions.push("add a closing quote".into());
            diag
        }
    }
}

fn format_parse_error(error: &ParseError, source: &str, filename: &str) -> Diagnostic {
    let (code, message, width) = match error {
        ParseError::UnexpectedEof { expected } => {
            return Diagnostic {
                code: "E011",
                message: format!("unexpected end of input, expected {}", expected),
                file: Some(filename.to_string()),
                line: None,
                col: None,
                source_line: None,
                underline: None,
                suggestions: vec!["check for a missing '}', ']' or ')'".into()],
            }
        }
        ParseError::Unexpected {
            found, expected, ..
        } => (
            "E010",
            format!("unexpected token '{}', expected {}", found, expected),
            found.chars().count(),
        ),
        ParseError::TooDeep { limit, .. } => (
            "E012",
            format!("nesting deeper than {} levels", limit),
            1,
        ),
    };
    let (line, col) = error.position().unwrap_or((1, 1));
    located(code, message, source, filename, line, col, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn test_lex_error_points_at_char() {
        let source = "1 2 +\n3 ~ .";
        let err = compile(source).unwrap_err();
        let text = format_error(&err, source, "main.snake");
        assert!(text.starts_with("error[E002]: unexpected character '~'\n"));
        assert!(text.contains("  --> main.snake:2:3\n"));
        assert!(text.contains("  2 | 3 ~ .\n"));
        assert!(text.contains("   |   ^\n"));
    }

    #[test]
    fn test_parse_error_underlines_token() {
        let source = r"\ inc : # > 5 { }";
        let err = compile(source).unwrap_err();
        let diag = format_compile_error(&err, source, "f.snake");
        assert_eq!(diag.code, "E010");
        assert_eq!(diag.col, Some(13));
        assert_eq!(diag.underline.as_deref(), Some("            ^"));
    }

    #[test]
    fn test_eof_has_no_location() {
        let err = compile("[1 2").unwrap_err();
        let text = format_error(&err, "[1 2", "f.snake");
        assert!(text.starts_with("error[E011]: unexpected end of input, expected ]"));
        assert!(!text.contains("-->"));
    }

    #[test]
    fn test_nesting_limit_points_at_opener() {
        let source = format!("1 .\n{}", "(".repeat(300));
        let err = compile(&source).unwrap_err();
        let diag = format_compile_error(&err, &source, "f.snake");
        assert_eq!(diag.code, "E012");
        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.col, Some(257));
    }

    #[test]
    fn test_ansi_render_has_color_codes() {
        let err = compile("~").unwrap_err();
        let diag = format_compile_error(&err, "~", "f.snake");
        assert!(diag.render_ansi().contains("\x1b[31merror\x1b[0m"));
    }
}
