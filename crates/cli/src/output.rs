//! Human and JSON rendering shared by the command handlers.

use std::io::Write;

use {
    jfp_skills::{BatchReport, Outcome},
    serde::Serialize,
};

pub(crate) const GREEN: &str = "\x1b[32m";
pub(crate) const RED: &str = "\x1b[31m";
pub(crate) const YELLOW: &str = "\x1b[33m";
pub(crate) const CYAN: &str = "\x1b[36m";
pub(crate) const DIM: &str = "\x1b[2m";
pub(crate) const BOLD: &str = "\x1b[1m";
pub(crate) const RESET: &str = "\x1b[0m";

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Non-fatal problems go to stderr so stdout stays parseable.
pub(crate) fn print_warnings(warnings: &[String]) {
    let _ = write_warnings(&mut std::io::stderr().lock(), warnings);
}

fn write_warnings(out: &mut impl Write, warnings: &[String]) -> std::io::Result<()> {
    for w in warnings {
        writeln!(out, "{YELLOW}warning{RESET} {w}")?;
    }
    Ok(())
}

pub(crate) fn print_report(label: &str, report: &BatchReport) {
    let mode = if report.dry_run {
        " (dry run)"
    } else {
        ""
    };
    println!("{BOLD}{label}{RESET} {DIM}{}{RESET}{mode}", report.root.display());

    if report.results.is_empty() {
        println!("  nothing to do");
    }
    for r in &report.results {
        let (color, word) = match r.outcome {
            Outcome::Installed => (GREEN, "installed"),
            Outcome::Updated => (GREEN, "updated"),
            Outcome::Unchanged => (DIM, "unchanged"),
            Outcome::Skipped => (YELLOW, "skipped"),
            Outcome::Failed => (RED, "failed"),
            Outcome::Removed => (CYAN, "removed"),
        };
        match &r.reason {
            Some(reason) => println!("  {color}{word:<9}{RESET} {} {DIM}({reason}){RESET}", r.id),
            None => println!("  {color}{word:<9}{RESET} {}", r.id),
        }
        if let Some(diff) = &r.diff {
            for line in diff.lines() {
                let color = match line.chars().next() {
                    Some('+') => GREEN,
                    Some('-') => RED,
                    _ => DIM,
                };
                println!("      {color}{line}{RESET}");
            }
        }
    }

    let c = &report.counts;
    println!(
        "  {} installed, {} updated, {} unchanged, {} skipped, {} failed, {} removed",
        c.installed, c.updated, c.unchanged, c.skipped, c.failed, c.removed
    );
    if let Some(warning) = &report.manifest_warning {
        eprintln!("{RED}warning{RESET} {warning}");
    }
    if report.results.iter().any(|r| r.is_protected_skip()) {
        eprintln!("{DIM}re-run with --force to overwrite protected files{RESET}");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_warning_gets_its_own_line() {
        let mut buf = Vec::new();
        let warnings = vec![
            "catalog fetch failed: timed out".to_string(),
            "using bundled catalog".to_string(),
        ];
        write_warnings(&mut buf, &warnings).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("warning\x1b[0m catalog fetch failed: timed out"));
        assert!(lines[1].ends_with("using bundled catalog"));
    }

    #[test]
    fn no_warnings_writes_nothing() {
        let mut buf = Vec::new();
        write_warnings(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }
}
