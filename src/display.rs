//! Operator-facing rendering of raw commands.
//!
//! The rewrite is cosmetic only: the string transmitted to the backend is
//! always the raw command.

use std::sync::LazyLock;

use regex::Regex;

/// A single rewrite step.
pub struct DisplayRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub replacement: &'static str,
}

/// Ordered rewrite table. Each rule sees the output of the previous one.
///
/// Path rules only touch the word in command position: the start of the
/// input or right after `;`, `&&`, `||` or `|`. Paths passed as arguments
/// are left alone.
const RULE_SOURCES: [(&str, &str, &str); 4] = [
    (
        "export-preamble",
        r#"^\s*export\s+(?:[A-Za-z_][A-Za-z0-9_]*=(?:"[^"]*"|'[^']*'|[^\s;&|]*)\s*)+(?:&&|;)\s*"#,
        "",
    ),
    (
        "interpreter-path",
        r"(?P<lead>^\s*|[;&|]\s*)(?:/[\w.+-]+)+/(?P<bin>php|python|node)[\d.]*(?P<sep>\s+)(?P<entry>artisan|manage\.py|ace)\b",
        "${lead}${bin}${sep}${entry}",
    ),
    (
        "package-manager-path",
        r"(?P<lead>^\s*|[;&|]\s*)(?:/[\w.+-]+)+/(?P<bin>composer|npm|npx|yarn|pnpm|pip3?)(?P<tail>\s|$)",
        "${lead}${bin}${tail}",
    ),
    (
        "framework-entrypoint",
        r"(?P<lead>^\s*|[;&|]\s*)(?:(?:/[\w.+-]+)+/)?(?P<bin>php|python|node)[\d.]*(?P<sep>\s+)(?:/[\w.+-]+)+/(?P<entry>artisan|manage\.py|ace)\b",
        "${lead}${bin}${sep}${entry}",
    ),
];

static RULES: LazyLock<Vec<DisplayRule>> = LazyLock::new(|| {
    RULE_SOURCES
        .iter()
        .map(|&(name, pattern, replacement)| DisplayRule {
            name,
            pattern: Regex::new(pattern).expect("valid regex"),
            replacement,
        })
        .collect()
});

/// The rewrite table, in application order.
pub fn rules() -> &'static [DisplayRule] {
    &RULES
}

/// Rewrite `raw` into its display form. Unmatched input comes back unchanged.
pub fn format_command(raw: &str) -> String {
    let mut output = raw.to_string();
    for rule in RULES.iter() {
        output = rule
            .pattern
            .replace_all(&output, rule.replacement)
            .into_owned();
    }
    output
}
