//! Locally authored prompts: `*.json` files holding one prompt or an array.

use std::path::Path;

use {
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::types::Prompt;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<Prompt>),
    Many(Vec<Prompt>),
}

/// Read every `*.json` file in `dir`, in file-name order.
///
/// Unreadable or invalid files are skipped with a warning; a missing
/// directory yields nothing. Returned prompts are marked `is_local`.
pub fn load_local_prompts(dir: &Path) -> Vec<Prompt> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "cannot read local prompts dir");
            }
            return Vec::new();
        },
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut prompts = Vec::new();
    for file in files {
        let raw = match std::fs::read_to_string(&file) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable local prompt");
                continue;
            },
        };
        let parsed = match serde_json::from_str::<OneOrMany>(&raw) {
            Ok(OneOrMany::One(p)) => vec![*p],
            Ok(OneOrMany::Many(ps)) => ps,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping invalid local prompt");
                continue;
            },
        };
        for mut prompt in parsed {
            if prompt.id.trim().is_empty() {
                warn!(file = %file.display(), "skipping local prompt without id");
                continue;
            }
            prompt.is_local = true;
            prompts.push(prompt);
        }
    }

    debug!(dir = %dir.display(), count = prompts.len(), "loaded local prompts");
    prompts
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_local_prompts(&tmp.path().join("nope")).is_empty());
    }

    #[test]
    fn reads_single_and_array_files_skipping_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("a.json"),
            r#"{"id":"mine","title":"Mine","content":"local body"}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("b.json"),
            r#"[{"id":"x","title":"X","content":"1"},{"id":"","title":"blank","content":"2"}]"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("c.json"), "{ not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let prompts = load_local_prompts(tmp.path());
        let ids: Vec<_> = prompts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["mine", "x"]);
        assert!(prompts.iter().all(|p| p.is_local));
    }
}
