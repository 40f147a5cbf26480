/// Expand `${VAR}` and `${VAR:-fallback}` placeholders in raw config text.
///
/// Unset variables without a fallback are left untouched so the parser can
/// report them in context.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with an injectable lookup.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated, keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) if !value.is_empty() => out.push_str(&value),
            (false, _, Some(fallback)) => out.push_str(fallback),
            (false, Some(value), None) => out.push_str(&value),
            _ => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "JFP_REGISTRY" => Some("https://mirror.example.com/api/prompts".into()),
            "JFP_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("url = \"${JFP_REGISTRY}\"", lookup),
            "url = \"https://mirror.example.com/api/prompts\""
        );
    }

    #[test]
    fn unknown_var_stays_literal() {
        assert_eq!(substitute_env_with("${JFP_MISSING}", lookup), "${JFP_MISSING}");
    }

    #[test]
    fn fallback_used_when_unset_or_empty() {
        assert_eq!(substitute_env_with("${JFP_MISSING:-2000}", lookup), "2000");
        assert_eq!(substitute_env_with("${JFP_EMPTY:-x}", lookup), "x");
        assert_eq!(
            substitute_env_with("${JFP_REGISTRY:-unused}", lookup),
            "https://mirror.example.com/api/prompts"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${JFP_REGISTRY", lookup), "a ${JFP_REGISTRY");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
