//! Render catalog entries into `SKILL.md` artifacts.
//!
//! Output is a YAML frontmatter block followed by markdown. The frontmatter
//! always carries [`GENERATED_MARKER`] so generated files can be recognised
//! without consulting a manifest. Rendering is a pure function of the entry:
//! no timestamps or host details end up in the file, so hashes are stable.

use std::{fmt::Write as _, path::Path};

use jfp_registry::{Bundle, Prompt};

/// File written inside each `<root>/<id>/` directory.
pub const SKILL_FILE: &str = "SKILL.md";

pub const GENERATED_MARKER: &str = "x-jfp-generated: true";

const SOURCE: &str = "jeffreysprompts";
const FRONTMATTER_FENCE: &str = "---";

pub fn render_prompt(prompt: &Prompt) -> String {
    let mut out = frontmatter(
        &prompt.id,
        prompt.description.as_deref().unwrap_or(&prompt.title),
        prompt.version_or_default(),
        &prompt.tags,
    );
    let _ = writeln!(out, "# {}\n", prompt.title);
    if let Some(desc) = &prompt.description {
        let _ = writeln!(out, "> {desc}\n");
    }
    push_variables(&mut out, prompt, "##");
    out.push_str(prompt.content.trim_end());
    out.push('\n');
    out
}

/// Plain markdown for sharing: no frontmatter and no generated marker.
pub fn render_markdown(prompt: &Prompt) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", prompt.title);
    if let Some(desc) = &prompt.description {
        let _ = writeln!(out, "{desc}\n");
    }
    if let Some(category) = &prompt.category {
        let _ = writeln!(out, "**Category**: {category}\n");
    }
    if !prompt.tags.is_empty() {
        let _ = writeln!(out, "**Tags**: {}\n", prompt.tags.join(", "));
    }
    push_variables(&mut out, prompt, "##");
    out.push_str("---\n\n");
    out.push_str(prompt.content.trim_end());
    out.push('\n');
    out
}

/// One combined artifact: the bundle header, then a section per prompt in
/// bundle order.
pub fn render_bundle(bundle: &Bundle, prompts: &[&Prompt]) -> String {
    let mut out = frontmatter(
        &bundle.id,
        bundle.description.as_deref().unwrap_or(&bundle.title),
        bundle.version_or_default(),
        &[],
    );
    let _ = writeln!(out, "# {}\n", bundle.title);
    if let Some(desc) = &bundle.description {
        let _ = writeln!(out, "{desc}\n");
    }
    for prompt in prompts {
        let _ = writeln!(out, "## {}\n", prompt.title);
        if let Some(desc) = &prompt.description {
            let _ = writeln!(out, "> {desc}\n");
        }
        push_variables(&mut out, prompt, "###");
        out.push_str(prompt.content.trim_end());
        out.push_str("\n\n");
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

/// True when the file's leading frontmatter contains the generated marker.
/// Missing or unreadable files are not generated.
pub fn is_generated_by_tool(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => has_generated_marker(&content),
        Err(_) => false,
    }
}

pub fn has_generated_marker(content: &str) -> bool {
    let mut lines = content.lines();
    if lines.next().map(str::trim_end) != Some(FRONTMATTER_FENCE) {
        return false;
    }
    for line in lines {
        let line = line.trim();
        if line == FRONTMATTER_FENCE {
            return false;
        }
        if line == GENERATED_MARKER {
            return true;
        }
    }
    false
}

fn frontmatter(name: &str, description: &str, version: &str, tags: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{FRONTMATTER_FENCE}");
    let _ = writeln!(out, "name: {name}");
    let _ = writeln!(out, "description: {}", yaml_quote(description));
    let _ = writeln!(out, "version: {}", yaml_quote(version));
    if !tags.is_empty() {
        let quoted: Vec<_> = tags.iter().map(|t| yaml_quote(t)).collect();
        let _ = writeln!(out, "tags: [{}]", quoted.join(", "));
    }
    let _ = writeln!(out, "source: {SOURCE}");
    let _ = writeln!(out, "{GENERATED_MARKER}");
    let _ = writeln!(out, "{FRONTMATTER_FENCE}\n");
    out
}

fn push_variables(out: &mut String, prompt: &Prompt, heading: &str) {
    if prompt.variables.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading} Variables\n");
    for var in &prompt.variables {
        let _ = write!(out, "- `{{{{{}}}}}`", var.name);
        if let Some(desc) = &var.description {
            let _ = write!(out, ": {desc}");
        }
        if let Some(default) = &var.default {
            let _ = write!(out, " (default: {default})");
        }
        out.push('\n');
    }
    out.push('\n');
}

fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {},
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
