//! Wire types for the Quip automation API.

use serde::{Deserialize, Serialize};

/// Thread metadata returned by most document endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub updated_usec: i64,
    /// Secret path segment of `link`, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_path: Option<String>,
}

/// Response of `/1/threads/{id}` and of each search/recent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub thread: ThreadInfo,
    /// Document HTML as of this response. Absent on listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Response of `/1/threads/edit-document`: the thread plus its full HTML
/// after the edit was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResponse {
    pub thread: ThreadInfo,
    #[serde(default)]
    pub html: String,
}

/// One page of `/2/threads/{id}/html`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HtmlPage {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Source format of a new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Html,
    Markdown,
}

impl DocumentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentFormat::Html => "html",
            DocumentFormat::Markdown => "markdown",
        }
    }
}

/// Where an edit applies. Sent to Quip as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Append,
    Prepend,
    AfterSection,
    BeforeSection,
    ReplaceSection,
    DeleteSection,
    AfterDocumentRange,
    BeforeDocumentRange,
    ReplaceDocumentRange,
    DeleteDocumentRange,
}

impl Location {
    pub fn code(self) -> u8 {
        match self {
            Location::Append => 0,
            Location::Prepend => 1,
            Location::AfterSection => 2,
            Location::BeforeSection => 3,
            Location::ReplaceSection => 4,
            Location::DeleteSection => 5,
            Location::AfterDocumentRange => 6,
            Location::BeforeDocumentRange => 7,
            Location::ReplaceDocumentRange => 8,
            Location::DeleteDocumentRange => 9,
        }
    }

    /// Locations addressed by `section_id`.
    pub fn targets_section(self) -> bool {
        matches!(
            self,
            Location::AfterSection
                | Location::BeforeSection
                | Location::ReplaceSection
                | Location::DeleteSection
        )
    }

    /// Locations addressed by `document_range` (a heading's text).
    pub fn targets_range(self) -> bool {
        matches!(
            self,
            Location::AfterDocumentRange
                | Location::BeforeDocumentRange
                | Location::ReplaceDocumentRange
                | Location::DeleteDocumentRange
        )
    }

    pub fn carries_content(self) -> bool {
        !matches!(self, Location::DeleteSection | Location::DeleteDocumentRange)
    }
}

/// A single edit against an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Add HTML at the end of the document.
    Append(String),
    /// Add HTML at the start of the document.
    Prepend(String),
    /// Remove the heading whose text matches exactly, plus everything up to
    /// the next heading of the same or higher level.
    DeleteRange(String),
    /// Remove the block with this section id.
    DeleteSection(String),
    /// Any other location; `anchor` is the section id or range text it needs.
    Custom {
        location: Location,
        anchor: Option<String>,
        content: Option<String>,
    },
}

impl EditOperation {
    pub fn location(&self) -> Location {
        match self {
            EditOperation::Append(_) => Location::Append,
            EditOperation::Prepend(_) => Location::Prepend,
            EditOperation::DeleteRange(_) => Location::DeleteDocumentRange,
            EditOperation::DeleteSection(_) => Location::DeleteSection,
            EditOperation::Custom { location, .. } => *location,
        }
    }

    /// Form fields for this edit, minus `thread_id`.
    pub(crate) fn form_fields(&self) -> Vec<(&'static str, String)> {
        let location = self.location();
        let mut fields = vec![("location", location.code().to_string())];
        match self {
            EditOperation::Append(html) | EditOperation::Prepend(html) => {
                fields.push(("format", DocumentFormat::Html.as_str().to_string()));
                fields.push(("content", html.clone()));
            }
            EditOperation::DeleteRange(range) => {
                fields.push(("document_range", range.clone()));
            }
            EditOperation::DeleteSection(section) => {
                fields.push(("section_id", section.clone()));
            }
            EditOperation::Custom {
                anchor, content, ..
            } => {
                if let Some(anchor) = anchor {
                    if location.targets_section() {
                        fields.push(("section_id", anchor.clone()));
                    } else if location.targets_range() {
                        fields.push(("document_range", anchor.clone()));
                    }
                }
                if let Some(content) = content.as_ref().filter(|_| location.carries_content()) {
                    fields.push(("format", DocumentFormat::Html.as_str().to_string()));
                    fields.push(("content", content.clone()));
                }
            }
        }
        fields
    }
}

/// Raw bytes of an image or attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Blob {
    /// File extension implied by the content type: `image/svg+xml` → `svg`.
    pub fn extension(&self) -> String {
        let subtype = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let extension = subtype.split('+').next().unwrap_or_default();
        match extension {
            "" => "bin".to_string(),
            "jpeg" => "jpg".to_string(),
            other => other.to_ascii_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_codes_are_stable() {
        let all = [
            Location::Append,
            Location::Prepend,
            Location::AfterSection,
            Location::BeforeSection,
            Location::ReplaceSection,
            Location::DeleteSection,
            Location::AfterDocumentRange,
            Location::BeforeDocumentRange,
            Location::ReplaceDocumentRange,
            Location::DeleteDocumentRange,
        ];
        let codes: Vec<u8> = all.iter().map(|l| l.code()).collect();
        assert_eq!(codes, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn delete_range_sends_document_range() {
        let fields = EditOperation::DeleteRange("Intro".to_string()).form_fields();
        assert_eq!(
            fields,
            vec![
                ("location", "9".to_string()),
                ("document_range", "Intro".to_string())
            ]
        );
    }

    #[test]
    fn prepend_sends_html_content() {
        let fields = EditOperation::Prepend("<p>x</p>".to_string()).form_fields();
        assert!(fields.contains(&("location", "1".to_string())));
        assert!(fields.contains(&("format", "html".to_string())));
        assert!(fields.contains(&("content", "<p>x</p>".to_string())));
    }

    #[test]
    fn custom_delete_drops_content() {
        let op = EditOperation::Custom {
            location: Location::DeleteSection,
            anchor: Some("temp:s:1".to_string()),
            content: Some("ignored".to_string()),
        };
        let fields = op.form_fields();
        assert!(fields.contains(&("section_id", "temp:s:1".to_string())));
        assert!(!fields.iter().any(|(k, _)| *k == "content"));
    }

    #[test]
    fn blob_extension_from_content_type() {
        let blob = |ct: &str| Blob {
            bytes: vec![],
            content_type: ct.to_string(),
        };
        assert_eq!(blob("image/png").extension(), "png");
        assert_eq!(blob("image/svg+xml").extension(), "svg");
        assert_eq!(blob("image/jpeg; charset=binary").extension(), "jpg");
        assert_eq!(blob("").extension(), "bin");
    }

    #[test]
    fn thread_response_ignores_unknown_fields() {
        let json = r#"{"thread":{"id":"T1","title":"Doc","link":"https://quip.com/abc","updated_usec":5,"type":"document"},"user_ids":[]}"#;
        let parsed: ThreadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.thread.id, "T1");
        assert_eq!(parsed.html, None);
    }
}
