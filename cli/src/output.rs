use colored::Colorize;
use lucid_core::ParseWarning;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// One line per diagnostic, file:line prefixed when the line is known.
pub fn warnings(warnings: &[ParseWarning]) {
    for w in warnings {
        let location = if w.line > 0 {
            format!("{}:{}", w.file.display(), w.line)
        } else {
            w.file.display().to_string()
        };
        warn(&format!("[{}] {}: {}", w.kind, location, w.detail));
    }
}
