//! Wiki-link and heading parsing for block content.
//!
//! Block text may embed `[[Card Title]]` links and may open with a markdown
//! heading. Both are derived state: the mutation layer diffs link occurrences
//! into `card/inline-links-to` facts and mirrors the heading into the unique
//! `card/title` attribute.

/// Collect the distinct `[[link]]` targets in `text`, in order of first
/// appearance. Unterminated or empty links are ignored.
pub fn wiki_links(text: &str) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  let mut rest = text;
  while let Some(start) = rest.find("[[") {
    let after = &rest[start + 2..];
    match after.find("]]") {
      Some(end) => {
        let target = after[..end].trim();
        if !target.is_empty() && !out.iter().any(|t| t == target) {
          out.push(target.to_string());
        }
        rest = &after[end + 2..];
      }
      None => break,
    }
  }
  out
}

/// The derived title of a block: the text of a leading `#` heading, if any.
pub fn heading_title(content: &str) -> Option<&str> {
  let first = content.lines().next()?;
  let title = first.strip_prefix('#')?.trim_start_matches('#').trim();
  if title.is_empty() { None } else { Some(title) }
}

/// Rewrite every literal `[[old]]` occurrence to `[[new]]`.
pub fn rename_links(text: &str, old: &str, new: &str) -> String {
  text.replace(&format!("[[{old}]]"), &format!("[[{new}]]"))
}
