use once_cell::sync::Lazy;
use regex::Regex;

static ANCHOR_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\s+[^>]*href\s*=\s*["']([^"']+)["'][^>]*>"#)
        .expect("anchor pattern must compile")
});

/// Extracts every anchor `href` from a pack's `modlist.html`, in document order.
///
/// The result is paired with the manifest's files by position only.
pub fn parse_link_list(html: &str) -> Vec<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .map(|c| c[1].trim().to_string())
        .collect()
}
