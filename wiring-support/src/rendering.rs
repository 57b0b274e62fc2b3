//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format dependency chains, initialization plans,
//! and helpful suggestions in error output.

/// Renders a dependency chain as a readable string.
///
/// # Examples
/// ```
/// use wiring_support::rendering::render_chain;
///
/// let chain = vec!["service.a", "service.b", "service.a"];
/// let rendered = render_chain(&chain);
/// assert_eq!(rendered, "service.a → service.b → service.a");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders an initialization plan, one service per line, in run order.
///
/// ```text
/// [global ] service.a  (init: connect)
///       ↓
/// [request] service.c  (init: warm_up, async)
/// ```
pub fn render_plan(entries: &[PlanEntry]) -> String {
    let mut result = String::new();
    let max_scope_len = entries
        .iter()
        .map(|e| e.scope.len())
        .max()
        .unwrap_or(0);

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            result.push_str(&" ".repeat(max_scope_len + 3));
            result.push_str("↓\n");
        }

        result.push_str(&format!(
            "[{:<width$}] {}",
            entry.scope,
            entry.service_id,
            width = max_scope_len,
        ));

        if let Some(ref method) = entry.method {
            if entry.is_async {
                result.push_str(&format!("  (init: {method}, async)"));
            } else {
                result.push_str(&format!("  (init: {method})"));
            }
        }

        result.push('\n');
    }

    result
}

/// An entry of an initialization plan for [`render_plan`].
#[derive(Debug)]
pub struct PlanEntry {
    /// The service id
    pub service_id: String,
    /// The scope (e.g., "global", "request")
    pub scope: String,
    /// The initializer method, if one was declared
    pub method: Option<String>,
    /// Whether the initializer completes asynchronously
    pub is_async: bool,
}

/// Returns the last segment of a dotted or slashed identifier.
///
/// ```
/// use wiring_support::rendering::last_segment;
///
/// assert_eq!(last_segment("app.mailer.transport"), "transport");
/// assert_eq!(last_segment("services/simple-service"), "simple-service");
/// assert_eq!(last_segment("logger"), "logger");
/// ```
pub fn last_segment(id: &str) -> &str {
    id.rsplit(|c: char| c == '.' || c == '/').next().unwrap_or(id)
}

/// Generates "did you mean?" suggestions for an unknown identifier.
///
/// Compares the requested id against the available ones and
/// returns the closest matches, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = last_segment(&requested_lower).to_string();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            if name == requested {
                return None;
            }

            let name_lower = name.to_lowercase();
            let name_short = last_segment(&name_lower).to_string();

            if name_lower.contains(&requested_lower)
                || requested_lower.contains(&name_lower)
            {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short)
                || requested_short.contains(&name_short)
            {
                return Some((name, 80));
            }

            let common = name_lower
                .chars()
                .zip(requested_lower.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, (common * 10).min(90)));
            }

            None
        })
        .collect();

    // stable sort keeps declaration order among equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
