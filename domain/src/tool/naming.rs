//! Tool name namespacing.
//!
//! Tools from different servers share one flat name space by prefixing the
//! owning server: `<server>__<tool>`. Server names may not contain the
//! separator, so the split is unambiguous even when the tool name does.

use crate::core::error::DomainError;

/// Separator between server and tool in a namespaced name.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Maximum edit distance for a name to be offered as a suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Build the namespaced name for a tool.
pub fn qualify(server: &str, tool: &str) -> String {
    format!("{server}{NAMESPACE_SEPARATOR}{tool}")
}

/// Split a namespaced name into `(server, tool)`.
///
/// Splits at the first separator. Returns `None` for bare names or when
/// either half would be empty.
pub fn split_namespaced(name: &str) -> Option<(&str, &str)> {
    let (server, tool) = name.split_once(NAMESPACE_SEPARATOR)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

/// Validate a server name for use as a namespace prefix and store key.
pub fn validate_server_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidServerName(name.to_string(), "empty"));
    }
    if name.contains(NAMESPACE_SEPARATOR) {
        return Err(DomainError::InvalidServerName(
            name.to_string(),
            "contains '__'",
        ));
    }
    if name.contains('/') || name.contains('\t') || name.contains('\n') {
        return Err(DomainError::InvalidServerName(
            name.to_string(),
            "contains '/' or whitespace control characters",
        ));
    }
    Ok(())
}

/// Names from `candidates` close to `name`, best match first.
///
/// Prefix matches rank ahead of edit-distance matches. At most `limit`
/// names are returned.
pub fn nearest_names<'a, I>(name: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = name.to_lowercase();
    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let lower = candidate.to_lowercase();
            if lower.starts_with(&needle) || needle.starts_with(&lower) {
                return Some((0, candidate.to_string()));
            }
            let dist = levenshtein(&needle, &lower);
            (dist <= MAX_SUGGESTION_DISTANCE).then(|| (dist, candidate.to_string()))
        })
        .collect();
    scored.sort();
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(limit).map(|(_, n)| n).collect()
}

/// Levenshtein distance with a single rolling row.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    let mut prev_row: Vec<usize> = (0..=n).collect();
    let mut curr_row = vec![0usize; n + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[n]
}
