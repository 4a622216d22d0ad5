//! ANSI color helpers for terminal output.

pub fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

pub fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

/// Right-aligned bold green label, cargo style.
pub fn status_label(label: &str) -> String {
    format!("\x1b[1;32m{:>12}\x1b[0m", label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_label_is_padded() {
        assert_eq!(status_label("Running"), "\x1b[1;32m     Running\x1b[0m");
    }

    #[test]
    fn colors_wrap_and_reset() {
        assert!(red("x").ends_with("\x1b[0m"));
        assert!(green("x").contains('x'));
        assert!(yellow("x").starts_with("\x1b[33m"));
        assert!(gray("x").starts_with("\x1b[90m"));
        assert!(bold("x").starts_with("\x1b[1m"));
    }
}
