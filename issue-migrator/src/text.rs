//! Markup adaptation from Jira wiki syntax to GitLab flavoured markdown.
//!
//! Only block delimiters are rewritten. Inline formatting is close enough
//! between the two dialects that GitLab renders it acceptably as-is.

/// Literal substitutions applied to every description and comment body.
///
/// No replacement contains any pattern, so the table can be applied in any
/// order and applying it twice is the same as applying it once.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("{noformat}", "```"),
    ("[noformat]", "```"),
    ("{code}", "```"),
    ("{code:java}", "```java"),
    ("{code:ruby}", "```ruby"),
    ("{code:python}", "```python"),
    ("{code:javascript}", "```javascript"),
    ("{code:json}", "```json"),
    ("{code:xml}", "```xml"),
    ("{code:sql}", "```sql"),
    ("{code:bash}", "```bash"),
];

/// Rewrites Jira block markup into GitLab fenced code blocks.
#[must_use]
pub fn translate_markup(text: &str) -> String {
    SUBSTITUTIONS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}
