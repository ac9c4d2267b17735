//! Utility functions and helpers.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static CSS_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:\s*url\(\s*['"]?([^'")]+)['"]?\s*\)"#).ok()
});

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Pull the target out of a CSS `background-image:url(...)` declaration.
pub fn extract_css_url(style: &str) -> Option<String> {
    CSS_URL
        .as_ref()?
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_pattern_compiles() {
        assert!(CSS_URL.is_some());
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://t.me/").unwrap();
        assert_eq!(
            resolve_url(&base, "/durov/42?single"),
            "https://t.me/durov/42?single"
        );
        assert_eq!(
            resolve_url(&base, "https://cdn.example.com/x.jpg"),
            "https://cdn.example.com/x.jpg"
        );
    }

    #[test]
    fn test_extract_css_url() {
        assert_eq!(
            extract_css_url("width:100%;background-image:url('https://cdn.example.com/a.jpg')"),
            Some("https://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(
            extract_css_url("background-image: url(\"//cdn.example.com/b.jpg\")"),
            Some("//cdn.example.com/b.jpg".to_string())
        );
        assert_eq!(extract_css_url("width:100%"), None);
    }
}
