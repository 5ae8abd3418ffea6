//! YAML frontmatter parsing for Obsidian notes
//!
//! Parses the YAML frontmatter block at the start of markdown files:
//! ```markdown
//! ---
//! title: My Note
//! quip: https://quip.com/AbCdEf123/My-Note
//! ---
//!
//! Note content here...
//! ```
//!
//! Key order is preserved through a parse/serialize round trip so that
//! rewriting a single key does not reshuffle the user's metadata.

use serde_json::Value as JsonValue;

/// Parsed frontmatter as an ordered map of string keys to JSON values.
/// Using JSON values allows flexible typing (strings, numbers, arrays, objects).
pub type Frontmatter = serde_json::Map<String, JsonValue>;

/// A parsed note with frontmatter separated from content.
///
/// The `content` field borrows from `raw` to avoid unnecessary allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote<'a> {
    /// The frontmatter key-value pairs, if present
    pub frontmatter: Option<Frontmatter>,
    /// The note content after the frontmatter (borrows from raw)
    pub content: &'a str,
    /// The raw file content (frontmatter + content)
    pub raw: &'a str,
}

/// Split a note into frontmatter YAML string and content, without parsing the YAML.
///
/// Returns (frontmatter_yaml, content) where frontmatter_yaml is None if
/// no valid frontmatter block was found.
pub fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let Some(after_opening) = raw.strip_prefix("---") else {
        return (None, raw);
    };

    let Some(body) = after_opening
        .strip_prefix('\n')
        .or_else(|| after_opening.strip_prefix("\r\n"))
    else {
        // No newline after opening --- means this is a horizontal rule, not frontmatter
        return (None, raw);
    };

    match find_closing_delimiter(body) {
        Some(close_pos) => {
            let yaml = &body[..close_pos];
            let after_close = &body[close_pos + 3..];
            let content = after_close
                .strip_prefix('\n')
                .or_else(|| after_close.strip_prefix("\r\n"))
                .unwrap_or(after_close);
            (Some(yaml), content)
        }
        None => (None, raw),
    }
}

/// Find the byte position of the closing --- delimiter (must be a whole line)
fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut pos = 0;
    for line in s.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

/// Parse a note's raw content into frontmatter and content.
///
/// Invalid YAML is treated as "no frontmatter" here; use [`try_parse_frontmatter`]
/// when the caller is about to rewrite the note and must not drop the block.
pub fn parse_frontmatter(raw: &str) -> ParsedNote<'_> {
    let (yaml, content) = split_frontmatter(raw);
    let frontmatter = yaml
        .and_then(|yaml| parse_yaml_mapping(yaml).ok())
        .filter(|fm| !fm.is_empty());

    ParsedNote {
        frontmatter,
        content,
        raw,
    }
}

/// Strict variant of [`parse_frontmatter`]: a frontmatter block that is present
/// but not a YAML mapping is an error.
pub fn try_parse_frontmatter(raw: &str) -> Result<ParsedNote<'_>, FrontmatterError> {
    let (yaml, content) = split_frontmatter(raw);
    let frontmatter = match yaml {
        Some(yaml) if yaml.trim().is_empty() => None,
        Some(yaml) => Some(parse_yaml_mapping(yaml)?),
        None => None,
    };

    Ok(ParsedNote {
        frontmatter,
        content,
        raw,
    })
}

/// Serialize frontmatter to a YAML string.
///
/// Returns the YAML content without the surrounding `---` delimiters.
pub fn serialize_frontmatter(frontmatter: &Frontmatter) -> Result<String, FrontmatterError> {
    serde_yaml::to_string(frontmatter).map_err(FrontmatterError::Serialization)
}

/// Build a complete note with frontmatter and content.
///
/// If frontmatter is empty, returns just the content without frontmatter block.
pub fn build_note_with_frontmatter(
    frontmatter: &Frontmatter,
    content: &str,
) -> Result<String, FrontmatterError> {
    if frontmatter.is_empty() {
        return Ok(content.to_string());
    }

    let yaml = serialize_frontmatter(frontmatter)?;
    Ok(format!("---\n{}---\n{}", yaml, content))
}

/// Read-modify-write a note's frontmatter.
///
/// `transform` receives the current frontmatter (empty when the note has
/// none) and returns the frontmatter to write; the note body is kept as-is.
pub fn update_frontmatter<F>(raw: &str, transform: F) -> Result<String, FrontmatterError>
where
    F: FnOnce(Frontmatter) -> Frontmatter,
{
    let parsed = try_parse_frontmatter(raw)?;
    let updated = transform(parsed.frontmatter.unwrap_or_default());
    build_note_with_frontmatter(&updated, parsed.content)
}

/// Error type for frontmatter operations
#[derive(Debug)]
pub enum FrontmatterError {
    Serialization(serde_yaml::Error),
    InvalidYaml(serde_yaml::Error),
    NotAMapping,
}

impl std::fmt::Display for FrontmatterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontmatterError::Serialization(e) => write!(f, "Failed to serialize frontmatter: {}", e),
            FrontmatterError::InvalidYaml(e) => write!(f, "Frontmatter is not valid YAML: {}", e),
            FrontmatterError::NotAMapping => write!(f, "Frontmatter is not a key/value mapping"),
        }
    }
}

impl std::error::Error for FrontmatterError {}

fn parse_yaml_mapping(yaml: &str) -> Result<Frontmatter, FrontmatterError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(FrontmatterError::InvalidYaml)?;
    match value {
        serde_yaml::Value::Mapping(map) => Ok(map
            .into_iter()
            .filter_map(|(k, v)| yaml_key(k).map(|key| (key, yaml_to_json(v))))
            .collect()),
        serde_yaml::Value::Null => Ok(Frontmatter::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// Obsidian only addresses frontmatter by string keys; scalars are stringified.
fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a YAML value to a JSON value
fn yaml_to_json(yaml: serde_yaml::Value) -> JsonValue {
    match yaml {
        serde_yaml::Value::Null => JsonValue::Null,
        serde_yaml::Value::Bool(b) => JsonValue::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                JsonValue::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
        }
        serde_yaml::Value::String(s) => JsonValue::String(s),
        serde_yaml::Value::Sequence(seq) => {
            JsonValue::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => JsonValue::Object(
            map.into_iter()
                .filter_map(|(k, v)| yaml_key(k).map(|key| (key, yaml_to_json(v))))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}
