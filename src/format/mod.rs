//! The line grammar: one text line ↔ one [`Item`].
//!
//! ```text
//! ○ learn_python! 3mo "Learn Python basics" {"Programming"} beginner >>> ⊢[install_ide] @@@ due(2026-09-01) # notes
//! ```
//!
//! Layout, left to right:
//!
//! 1. Status symbol (`○ ◑ ⊘ ●`).
//! 2. Item id with an optional priority symbol suffixed (`learn_python!`).
//! 3. Optional duration (`3mo`).
//! 4. JSON-double-quoted title. The closing quote is located by scanning
//!    with backslash parity, so escaped quotes inside the title are fine.
//! 5. Mandatory charts block (`{}` when empty), immediately after the title.
//! 6. Optional comma-separated tags.
//! 7. Optional `>>>` relations section: `symbol[target,target]` groups.
//! 8. Optional `@@@` constraints section: `due(...)`, `window(...)`,
//!    `every(...)` calls.
//! 9. Optional `# user comment` and `### auto comment`. The auto comment is
//!    stripped first so a `#` inside it is not read as a user comment.
//!
//! Parsing is strict: every malformed section fails with a distinct
//! [`ParseError`]. Bulk loaders use [`parse_lines`], which downgrades
//! per-line failures to a warning and keeps going.

use thiserror::Error;

use crate::models::{Duration, Item, Priority, RelationKind, Status, TimeConstraint};

/// Why a single line failed to parse. Always fatal to that one line.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("blank or comment line is not an item")]
    EmptyLine,
    #[error("unknown status symbol {0:?}")]
    UnknownStatus(char),
    #[error("invalid item id {0:?}: expected lowercase letters, digits, underscores")]
    InvalidId(String),
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("no quoted title found")]
    MissingTitle,
    #[error("title quote is never closed")]
    UnterminatedTitle,
    #[error("title is not a valid JSON string: {0}")]
    InvalidTitle(String),
    #[error("invalid charts block: {0}")]
    InvalidCharts(String),
    #[error("unknown relation symbol {0:?}")]
    UnknownRelation(char),
    #[error("malformed relation group {0:?}")]
    InvalidRelationGroup(String),
    #[error("invalid time constraint {0:?}")]
    InvalidConstraint(String),
}

// ============================================================
// Parsing
// ============================================================

/// Parse one line into an [`Item`].
///
/// Blank lines and lines starting with `#` are not items (they are comments
/// or include directives) and fail with [`ParseError::EmptyLine`].
pub fn parse_line(line: &str) -> Result<Item, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Err(ParseError::EmptyLine);
    }

    // Status symbol.
    let first = line.chars().next().expect("line is non-empty");
    let status = Status::from_symbol(first).ok_or(ParseError::UnknownStatus(first))?;
    let rest = &line[first.len_utf8()..];

    // Everything before the opening title quote: id+priority, optional duration.
    let quote = rest.find('"').ok_or(ParseError::MissingTitle)?;
    let pre_title = &rest[..quote];
    let mut tokens = pre_title.split_whitespace();

    let id_token = tokens.next().ok_or(ParseError::MissingTitle)?;
    let (id, priority) = Priority::split_suffix(id_token);
    if !Item::valid_id(id) {
        return Err(ParseError::InvalidId(id_token.to_string()));
    }

    let duration = match tokens.next() {
        Some(token) => Some(
            Duration::parse(token).ok_or_else(|| ParseError::InvalidDuration(token.to_string()))?,
        ),
        None => None,
    };
    if let Some(extra) = tokens.next() {
        // Anything else before the title has no place in the grammar.
        return Err(ParseError::InvalidDuration(extra.to_string()));
    }

    // Title: scan from the opening quote for an unescaped closing quote.
    let title_span = &rest[quote..];
    let title_len = quoted_span_len(title_span).ok_or(ParseError::UnterminatedTitle)?;
    let title: String = serde_json::from_str(&title_span[..title_len])
        .map_err(|e| ParseError::InvalidTitle(e.to_string()))?;

    let mut post = &title_span[title_len..];

    // Comments come off first, auto (`###`) before user (`#`), so a `#`
    // inside the auto comment is never mis-read.
    let mut auto_comment = None;
    if let Some(pos) = post.find("###") {
        auto_comment = non_empty(&post[pos + 3..]);
        post = &post[..pos];
    }
    let mut user_comment = None;
    if let Some(pos) = post.find('#') {
        user_comment = non_empty(&post[pos + 1..]);
        post = &post[..pos];
    }

    // Constraints section.
    let mut constraints = Vec::new();
    if let Some(pos) = post.find("@@@") {
        for token in post[pos + 3..].split_whitespace() {
            let constraint = TimeConstraint::parse(token)
                .ok_or_else(|| ParseError::InvalidConstraint(token.to_string()))?;
            constraints.push(constraint);
        }
        post = &post[..pos];
    }

    // Relations section.
    let mut relations = std::collections::BTreeMap::new();
    if let Some(pos) = post.find(">>>") {
        for group in post[pos + 3..].split_whitespace() {
            let (kind, targets) = parse_relation_group(group)?;
            relations
                .entry(kind)
                .or_insert_with(Vec::new)
                .extend(targets);
        }
        post = &post[..pos];
    }

    // What remains is the mandatory charts block, then tags.
    let post = post.trim();
    if !post.starts_with('{') {
        return Err(ParseError::InvalidCharts(format!(
            "expected '{{' right after the title, found {:?}",
            post.chars().next().unwrap_or(' ')
        )));
    }
    let (charts, charts_len) = parse_charts(post)?;
    let tags = post[charts_len..]
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    Ok(Item {
        id: id.to_string(),
        title,
        status,
        priority,
        duration,
        charts,
        tags,
        relations,
        constraints,
        user_comment,
        auto_comment,
        occlude: false,
    })
}

/// Parse a whole buffer best-effort: blank and `#` lines are skipped as
/// comments, unparseable item lines are skipped with a warning. This is the
/// mode bulk loaders use so one bad hand-edit does not take the file down.
pub fn parse_lines(text: &str) -> Vec<Item> {
    let mut items = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(item) => items.push(item),
            Err(ParseError::EmptyLine) => {}
            Err(error) => {
                tracing::warn!(line = number + 1, %error, "skipping unparseable item line");
            }
        }
    }
    items
}

/// Byte length of the JSON string starting at `s` (which must begin with
/// `"`), including both quotes. `None` when the quote is never closed. A
/// quote preceded by an odd number of backslashes is escaped and does not
/// close the string.
fn quoted_span_len(s: &str) -> Option<usize> {
    debug_assert!(s.starts_with('"'));
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            let backslashes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
            if backslashes % 2 == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

fn parse_relation_group(group: &str) -> Result<(RelationKind, Vec<String>), ParseError> {
    let symbol = group
        .chars()
        .next()
        .ok_or_else(|| ParseError::InvalidRelationGroup(group.to_string()))?;
    let kind = RelationKind::from_symbol(symbol).ok_or(ParseError::UnknownRelation(symbol))?;
    let targets = group[symbol.len_utf8()..]
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| ParseError::InvalidRelationGroup(group.to_string()))?;
    let targets: Vec<String> = targets
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    for target in &targets {
        if !Item::valid_id(target) {
            return Err(ParseError::InvalidId(target.clone()));
        }
    }
    Ok((kind, targets))
}

/// Parse the `{"a","b"}` charts block at the start of `s`. Returns the
/// labels and the byte length consumed.
fn parse_charts(s: &str) -> Result<(Vec<String>, usize), ParseError> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes[0], b'{');
    let mut charts = Vec::new();
    let mut i = 1;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            Some(b'}') => return Ok((charts, i + 1)),
            Some(b'"') => {
                let span = quoted_span_len(&s[i..])
                    .ok_or_else(|| ParseError::InvalidCharts("unterminated label".into()))?;
                let label: String = serde_json::from_str(&s[i..i + span])
                    .map_err(|e| ParseError::InvalidCharts(e.to_string()))?;
                charts.push(label);
                i += span;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                match bytes.get(i) {
                    Some(b',') => i += 1,
                    Some(b'}') => {}
                    _ => return Err(ParseError::InvalidCharts("expected ',' or '}'".into())),
                }
            }
            _ => return Err(ParseError::InvalidCharts("expected '\"' or '}'".into())),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================
// Serialization
// ============================================================

/// Serialize an [`Item`] back to its one-line form.
///
/// Round-trips losslessly through [`parse_line`] for every field the grammar
/// carries (the `occlude` flag is encoded by file partition, not by the
/// line).
pub fn serialize_item(item: &Item) -> String {
    let mut line = String::new();
    line.push(item.status.symbol());
    line.push(' ');
    line.push_str(&item.id);
    line.push_str(item.priority.symbol());
    line.push(' ');
    if let Some(duration) = &item.duration {
        line.push_str(&duration.to_string());
        line.push(' ');
    }
    line.push_str(&serde_json::to_string(&item.title).expect("strings always serialize"));

    line.push_str(" {");
    for (i, chart) in item.charts.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&serde_json::to_string(chart).expect("strings always serialize"));
    }
    line.push('}');

    if !item.tags.is_empty() {
        line.push(' ');
        line.push_str(&item.tags.join(","));
    }

    if !item.relations.is_empty() {
        line.push_str(" >>>");
        for (kind, targets) in &item.relations {
            if targets.is_empty() {
                continue;
            }
            line.push(' ');
            line.push(kind.symbol());
            line.push('[');
            line.push_str(&targets.join(","));
            line.push(']');
        }
    }

    if !item.constraints.is_empty() {
        line.push_str(" @@@");
        for constraint in &item.constraints {
            line.push(' ');
            line.push_str(&constraint.to_string());
        }
    }

    if let Some(comment) = &item.user_comment {
        line.push_str(" # ");
        line.push_str(comment);
    }
    if let Some(comment) = &item.auto_comment {
        line.push_str(" ### ");
        line.push_str(comment);
    }

    line
}
