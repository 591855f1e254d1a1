use ansi_term::{Color, Style};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AuditError;

lazy_static! {
    pub static ref BOLD_RED: Style = Style::new().bold().fg(Color::Red);
    pub static ref BOLD_GREEN: Style = Style::new().bold().fg(Color::Green);
    pub static ref BOLD_YELLOW: Style = Style::new().bold().fg(Color::Yellow);
    pub static ref BOLD_CYAN: Style = Style::new().bold().fg(Color::Cyan);
}

pub fn info_print(title: &str, msg: &str) {
    println!("{} {}", BOLD_GREEN.paint(title), msg);
}

pub fn warn_print(title: &str, msg: &str) {
    println!("{} {}", BOLD_YELLOW.paint(title), msg);
}

pub fn error_print(msg: &str) {
    println!("{} {}", BOLD_RED.paint("error"), msg);
}

/// Compile a `*`-glob filter into an anchored regex.
/// Everything except `*` matches literally, so `react-*` or `@babel/*` work as expected.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, AuditError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');

    Regex::new(&re)
        .map_err(|e| AuditError::Unexpected(format!("cannot compile filter '{pattern}': {e}")))
}
