use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Version reported for catalog entries that do not carry one.
pub const DEFAULT_ENTRY_VERSION: &str = "1.0.0";

// ── Catalog entries ─────────────────────────────────────────────────────────

/// How a template variable is collected when a prompt is filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    Text,
    Multiline,
    File,
    Path,
    Select,
}

/// A `{{NAME}}` placeholder declared by a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVariable {
    pub name: String,
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

/// A single prompt from the catalog. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variables: Vec<PromptVariable>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Set for entries merged from the local prompts directory.
    #[serde(default, alias = "isLocal")]
    pub is_local: bool,
}

impl Prompt {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            description: None,
            category: None,
            tags: Vec::new(),
            variables: Vec::new(),
            featured: false,
            version: None,
            author: None,
            is_local: false,
        }
    }

    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_ENTRY_VERSION)
    }

    pub fn matches_category(&self, category: &str) -> bool {
        self.category
            .as_ref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// A named set of prompts installed together as one combined skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub author: Option<String>,
    /// Prompt ids, in render order.
    #[serde(default, alias = "promptIds")]
    pub prompts: Vec<String>,
}

impl Bundle {
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_ENTRY_VERSION)
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// The loaded catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub version: Option<String>,
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub bundles: Vec<Bundle>,
}

impl Registry {
    pub fn new(prompts: Vec<Prompt>) -> Self {
        Self {
            version: None,
            prompts,
            bundles: Vec::new(),
        }
    }

    pub fn get_prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn get_bundle(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id == id)
    }

    /// Resolve a bundle's prompt ids in bundle order, skipping unknown ids.
    pub fn prompts_for_bundle(&self, bundle: &Bundle) -> Vec<&Prompt> {
        bundle
            .prompts
            .iter()
            .filter_map(|id| self.get_prompt(id))
            .collect()
    }

    /// Insert or replace prompts by id; later entries win.
    pub fn merge_prompts(&mut self, prompts: impl IntoIterator<Item = Prompt>) -> usize {
        let mut merged = 0;
        for prompt in prompts {
            merged += 1;
            match self.prompts.iter_mut().find(|p| p.id == prompt.id) {
                Some(existing) => *existing = prompt,
                None => self.prompts.push(prompt),
            }
        }
        merged
    }

    /// Insert or replace bundles by id.
    pub fn merge_bundles(&mut self, bundles: impl IntoIterator<Item = Bundle>) {
        for bundle in bundles {
            match self.bundles.iter_mut().find(|b| b.id == bundle.id) {
                Some(existing) => *existing = bundle,
                None => self.bundles.push(bundle),
            }
        }
    }

    /// Categories with counts, sorted by name.
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for prompt in &self.prompts {
            if let Some(cat) = &prompt.category {
                *counts.entry(cat.clone()).or_default() += 1;
            }
        }
        let mut result: Vec<_> = counts.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Tags with counts, most used first.
    pub fn tags(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for prompt in &self.prompts {
            for tag in &prompt.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut result: Vec<_> = counts.into_iter().collect();
        result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        result
    }

    /// Prompts matching every criterion set on `filter`, in catalog order.
    pub fn filter(&self, filter: &PromptFilter<'_>) -> Vec<&Prompt> {
        self.prompts.iter().filter(|p| filter.matches(p)).collect()
    }
}

/// Listing criteria. Unset fields match everything; categories and tags
/// compare case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptFilter<'a> {
    pub category: Option<&'a str>,
    pub tag: Option<&'a str>,
    pub featured_only: bool,
}

impl PromptFilter<'_> {
    pub fn matches(&self, prompt: &Prompt) -> bool {
        self.category.is_none_or(|c| prompt.matches_category(c))
            && self.tag.is_none_or(|t| prompt.has_tag(t))
            && (!self.featured_only || prompt.featured)
    }
}

/// On-disk and over-the-wire catalog payload.
///
/// Older caches stored a bare array of prompts; both shapes are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PayloadShape {
    Full(Registry),
    Legacy(Vec<Prompt>),
}

impl From<PayloadShape> for Registry {
    fn from(shape: PayloadShape) -> Self {
        match shape {
            PayloadShape::Full(registry) => registry,
            PayloadShape::Legacy(prompts) => Registry::new(prompts),
        }
    }
}

// ── Load results ────────────────────────────────────────────────────────────

/// Where the returned catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySource {
    Remote,
    Cache,
    Bundled,
}

impl std::fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Cache => write!(f, "cache"),
            Self::Bundled => write!(f, "bundled"),
        }
    }
}

/// Cache metadata stored next to the payload cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(alias = "fetchedAt")]
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    #[serde(alias = "promptCount")]
    pub prompt_count: usize,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(id: &str, category: &str, tags: &[&str]) -> Prompt {
        let mut p = Prompt::new(id, id, "body");
        p.category = Some(category.into());
        p.tags = tags.iter().map(|t| (*t).to_string()).collect();
        p
    }

    #[test]
    fn prompt_filters_ignore_case() {
        let p = tagged("a", "Testing", &["Rust", "cli"]);
        assert!(p.matches_category("testing"));
        assert!(p.has_tag("rust"));
        assert!(p.has_tag("CLI"));
        assert!(!p.has_tag("python"));
    }

    #[test]
    fn categories_and_tags_are_counted() {
        let reg = Registry::new(vec![
            tagged("a", "debugging", &["quality", "review"]),
            tagged("b", "testing", &["quality"]),
            tagged("c", "debugging", &[]),
        ]);
        assert_eq!(
            reg.categories(),
            vec![("debugging".to_string(), 2), ("testing".to_string(), 1)]
        );
        assert_eq!(reg.tags()[0], ("quality".to_string(), 2));
    }

    #[test]
    fn merge_replaces_by_id_and_appends_new() {
        let mut reg = Registry::new(vec![Prompt::new("a", "A", "old"), Prompt::new("b", "B", "b")]);
        reg.merge_prompts(vec![Prompt::new("a", "A", "new"), Prompt::new("z", "Z", "z")]);
        let ids: Vec<_> = reg.prompts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "z"]);
        assert_eq!(reg.get_prompt("a").unwrap().content, "new");
    }

    #[test]
    fn bundle_resolution_keeps_order_and_skips_unknown() {
        let mut reg = Registry::new(vec![Prompt::new("a", "A", "a"), Prompt::new("b", "B", "b")]);
        reg.bundles.push(Bundle {
            id: "pack".into(),
            title: "Pack".into(),
            description: None,
            version: None,
            featured: false,
            author: None,
            prompts: vec!["b".into(), "gone".into(), "a".into()],
        });
        let bundle = reg.get_bundle("pack").unwrap();
        let ids: Vec<_> = reg
            .prompts_for_bundle(bundle)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(bundle.version_or_default(), DEFAULT_ENTRY_VERSION);
    }

    #[test]
    fn payload_accepts_legacy_array() {
        let legacy: PayloadShape =
            serde_json::from_str(r#"[{"id":"x","title":"X","content":"c"}]"#).unwrap();
        let reg = Registry::from(legacy);
        assert_eq!(reg.prompts.len(), 1);

        let full: PayloadShape = serde_json::from_str(
            r#"{"version":"2024.1","prompts":[],"bundles":[{"id":"b","title":"B","promptIds":["x"]}]}"#,
        )
        .unwrap();
        let reg = Registry::from(full);
        assert_eq!(reg.version.as_deref(), Some("2024.1"));
        assert_eq!(reg.bundles[0].prompts, ["x"]);
    }

    #[test]
    fn cache_meta_reads_camel_case() {
        let meta: CacheMeta = serde_json::from_str(
            r#"{"version":"1","etag":"\"abc\"","fetchedAt":"2025-01-01T00:00:00Z","promptCount":3}"#,
        )
        .unwrap();
        assert_eq!(meta.prompt_count, 3);
        assert_eq!(meta.etag.as_deref(), Some("\"abc\""));
    }

    #[test]
    fn filter_combines_criteria() {
        let mut review = Prompt::new("review", "Review", "r");
        review.category = Some("Coding".into());
        review.tags = vec!["Quality".into()];
        review.featured = true;
        let mut lint = Prompt::new("lint", "Lint", "l");
        lint.category = Some("coding".into());
        let mut essay = Prompt::new("essay", "Essay", "e");
        essay.tags = vec!["quality".into()];
        let reg = Registry::new(vec![review, lint, essay]);

        let ids = |f: PromptFilter<'_>| -> Vec<String> {
            reg.filter(&f).iter().map(|p| p.id.clone()).collect()
        };
        assert_eq!(ids(PromptFilter::default()), ["review", "lint", "essay"]);
        assert_eq!(
            ids(PromptFilter {
                category: Some("CODING"),
                ..Default::default()
            }),
            ["review", "lint"]
        );
        assert_eq!(
            ids(PromptFilter {
                tag: Some("quality"),
                ..Default::default()
            }),
            ["review", "essay"]
        );
        assert_eq!(
            ids(PromptFilter {
                category: Some("coding"),
                tag: Some("quality"),
                featured_only: true,
            }),
            ["review"]
        );
    }
}
