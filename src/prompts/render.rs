// Placeholder substitution for prompt templates

use std::collections::BTreeMap;

/// Placeholder name → final string value.
///
/// Values are inserted verbatim; callers JSON-encode anything that needs
/// quoting before it lands here.
pub type Replacements = BTreeMap<String, String>;

/// Replace every `{key}` in `template` with its value.
///
/// Placeholders without a matching replacement are left as-is, so optional
/// slots never break rendering. Braces that are not placeholders (JSON
/// examples inside a prompt) are untouched too.
///
/// The template is scanned once, left to right: text coming from a value is
/// never searched for placeholders again.
pub fn render(template: &str, replacements: &Replacements) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after
            .find('}')
            .map(|close| &after[..close])
            .and_then(|key| replacements.get(key).map(|value| (key.len(), value)));

        match hit {
            Some((key_len, value)) => {
                rendered.push_str(value);
                rest = &after[key_len + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Build a `Replacements` map from `(key, value)` pairs.
pub fn replacements<K, V, I>(pairs: I) -> Replacements
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
