//! HTML to Markdown conversion for imported documents.
//!
//! [`GfmConverter`] emits GitHub-flavoured Markdown: ATX headings, `***`
//! rules, `-` bullets, fenced code blocks, pipe tables, `~~strikethrough~~`
//! and `[x]` task items.

use crate::html::{heading_level, Document, NodeId, NodeKind};

/// Converts a parsed document into note markup.
pub trait MarkdownConverter: Send + Sync {
    fn convert(&self, doc: &Document) -> String;
}

#[derive(Debug, Clone)]
pub struct GfmConverter {
    pub bullet_marker: char,
    pub hr: String,
    pub em_delimiter: &'static str,
    pub strong_delimiter: &'static str,
}

impl Default for GfmConverter {
    fn default() -> Self {
        Self {
            bullet_marker: '-',
            hr: "***".to_string(),
            em_delimiter: "_",
            strong_delimiter: "**",
        }
    }
}

impl MarkdownConverter for GfmConverter {
    fn convert(&self, doc: &Document) -> String {
        let blocks = self.blocks(doc, doc.root());
        if blocks.is_empty() {
            String::new()
        } else {
            format!("{}\n", blocks.join("\n\n"))
        }
    }
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt", "figure",
    "figcaption", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "ul", "summary",
];

impl GfmConverter {
    /// Children of `id` as block-level markdown, one entry per block.
    /// Loose inline content between blocks becomes its own paragraph.
    fn blocks(&self, doc: &Document, id: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        let mut inline = String::new();

        for &child in doc.children(id) {
            if self.is_block(doc, child) {
                flush_paragraph(&mut inline, &mut out);
                let block = self.block(doc, child);
                let block = block.trim_matches('\n');
                if !block.trim().is_empty() {
                    out.push(block.to_string());
                }
            } else {
                inline.push_str(&self.inline(doc, child));
            }
        }
        flush_paragraph(&mut inline, &mut out);
        out
    }

    fn is_block(&self, doc: &Document, id: NodeId) -> bool {
        doc.tag_name(id).is_some_and(|name| BLOCK_ELEMENTS.contains(&name))
    }

    fn block(&self, doc: &Document, id: NodeId) -> String {
        let Some(name) = doc.tag_name(id) else {
            return String::new();
        };

        if let Some(level) = heading_level(name) {
            let text = clean_inline(&self.inline_children(doc, id)).replace('\n', " ");
            if text.is_empty() {
                return String::new();
            }
            return format!("{} {}", "#".repeat(usize::from(level)), text);
        }

        match name {
            "p" => clean_inline(&self.inline_children(doc, id)),
            "hr" => self.hr.clone(),
            "pre" => self.code_block(doc, id),
            "blockquote" => {
                self.blocks(doc, id)
                    .join("\n\n")
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {}", line)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "ul" | "ol" => self.list(doc, id),
            "table" => self.table(doc, id),
            _ => self.blocks(doc, id).join("\n\n"),
        }
    }

    fn code_block(&self, doc: &Document, id: NodeId) -> String {
        let code = doc
            .element_children(id)
            .into_iter()
            .find(|&c| doc.is_element(c, "code"));
        let language = code
            .and_then(|c| doc.attr(c, "class"))
            .or_else(|| doc.attr(id, "class"))
            .and_then(|classes| {
                classes
                    .split_ascii_whitespace()
                    .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
            })
            .unwrap_or_default()
            .to_string();
        let text = doc.text_content(code.unwrap_or(id));
        let text = text.strip_suffix('\n').unwrap_or(&text);

        let longest_run = longest_run(text, '`');
        let fence = "`".repeat(longest_run.max(2) + 1);
        format!("{}{}\n{}\n{}", fence, language, text, fence)
    }

    fn list(&self, doc: &Document, id: NodeId) -> String {
        let ordered = doc.is_element(id, "ol");
        let mut number: usize = doc
            .attr(id, "start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);
        let checklist = doc.has_class(id, "checklist");

        let mut items = Vec::new();
        for item in doc.element_children(id) {
            if !doc.is_element(item, "li") {
                continue;
            }
            let marker = if ordered {
                let m = format!("{}. ", number);
                number += 1;
                m
            } else {
                format!("{} ", self.bullet_marker)
            };

            let task = self.task_state(doc, item).or_else(|| {
                checklist.then(|| doc.has_class(item, "checked"))
            });
            let mut body = self.list_item(doc, item);
            if let Some(done) = task {
                body = format!("[{}] {}", if done { "x" } else { " " }, body);
            }

            let indent = " ".repeat(marker.len());
            let mut lines = body.lines();
            let mut rendered = format!("{}{}", marker, lines.next().unwrap_or_default());
            for line in lines {
                rendered.push('\n');
                if !line.is_empty() {
                    rendered.push_str(&indent);
                    rendered.push_str(line);
                }
            }
            items.push(rendered.trim_end().to_string());
        }
        items.join("\n")
    }

    /// Checkbox state of a task item, from an `<input type=checkbox>` that is
    /// a child of the item or of its first element child.
    fn task_state(&self, doc: &Document, item: NodeId) -> Option<bool> {
        let mut candidates = doc.children(item).to_vec();
        if let Some(&first) = doc.element_children(item).first() {
            candidates.extend_from_slice(doc.children(first));
        }
        candidates
            .into_iter()
            .find(|&n| {
                doc.is_element(n, "input")
                    && doc.attr(n, "type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox"))
            })
            .map(|input| doc.attr(input, "checked").is_some())
    }

    /// An item's content: inline text, with nested lists kept tight.
    fn list_item(&self, doc: &Document, item: NodeId) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut inline = String::new();
        let mut tight = true;

        for &child in doc.children(item) {
            if doc.is_element(child, "ul") || doc.is_element(child, "ol") {
                flush_inline(&mut inline, &mut parts, tight);
                parts.push(format!("\n{}", self.list(doc, child)));
            } else if self.is_block(doc, child) {
                flush_inline(&mut inline, &mut parts, tight);
                let block = self.block(doc, child);
                if !block.trim().is_empty() {
                    let sep = if parts.is_empty() { "" } else { "\n\n" };
                    parts.push(format!("{}{}", sep, block));
                    tight = false;
                }
            } else {
                inline.push_str(&self.inline(doc, child));
            }
        }
        flush_inline(&mut inline, &mut parts, tight);
        parts.concat().trim_matches('\n').to_string()
    }

    fn table(&self, doc: &Document, id: NodeId) -> String {
        let rows: Vec<NodeId> = doc
            .descendants(id)
            .into_iter()
            .filter(|&n| doc.is_element(n, "tr"))
            .collect();
        let mut grid: Vec<Vec<String>> = rows
            .iter()
            .map(|&row| {
                doc.element_children(row)
                    .into_iter()
                    .filter(|&c| doc.is_element(c, "td") || doc.is_element(c, "th"))
                    .map(|cell| {
                        clean_inline(&self.inline_children(doc, cell))
                            .replace('\n', " ")
                            .replace('|', "\\|")
                    })
                    .collect()
            })
            .collect();
        let columns = grid.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return String::new();
        }
        for row in &mut grid {
            row.resize(columns, String::new());
        }

        let render = |cells: &[String]| format!("| {} |", cells.join(" | "));
        let mut lines = vec![render(&grid[0])];
        lines.push(format!("|{}", " --- |".repeat(columns)));
        lines.extend(grid[1..].iter().map(|row| render(row)));
        lines.join("\n")
    }

    fn inline_children(&self, doc: &Document, id: NodeId) -> String {
        doc.children(id)
            .iter()
            .map(|&child| self.inline(doc, child))
            .collect()
    }

    fn inline(&self, doc: &Document, id: NodeId) -> String {
        let el = match doc.kind(id) {
            NodeKind::Text(t) => return escape_markdown(&collapse_whitespace(t)),
            NodeKind::Comment(_) | NodeKind::Fragment => return String::new(),
            NodeKind::Element(el) => el,
        };

        match el.name.as_str() {
            "br" => "\n".to_string(),
            "strong" | "b" => self.wrap(doc, id, self.strong_delimiter),
            "em" | "i" => self.wrap(doc, id, self.em_delimiter),
            "del" | "s" | "strike" => self.wrap(doc, id, "~~"),
            "code" | "kbd" | "samp" => {
                let text = doc.text_content(id);
                if text.is_empty() {
                    return String::new();
                }
                let fence = "`".repeat(longest_run(&text, '`') + 1);
                let pad = if text.starts_with('`') || text.ends_with('`') { " " } else { "" };
                format!("{fence}{pad}{text}{pad}{fence}")
            }
            "a" => {
                let text = self.inline_children(doc, id);
                match el.attr("href").filter(|h| !h.is_empty()) {
                    Some(href) => {
                        let title = el
                            .attr("title")
                            .map(|t| format!(" \"{}\"", t.replace('"', "\\\"")))
                            .unwrap_or_default();
                        format!("[{}]({}{})", text.trim(), link_destination(href), title)
                    }
                    None => text,
                }
            }
            "img" => match el.attr("src").filter(|s| !s.is_empty()) {
                Some(src) => {
                    let alt = el.attr("alt").unwrap_or_default();
                    format!("![{}]({})", escape_markdown(alt), link_destination(src))
                }
                None => String::new(),
            },
            "input" => String::new(),
            _ if BLOCK_ELEMENTS.contains(&el.name.as_str()) => {
                // Block inside inline context (e.g. a div in a table cell)
                format!("\n{}\n", self.inline_children(doc, id))
            }
            _ => self.inline_children(doc, id),
        }
    }

    /// `delimiter` around the element's content, keeping outer whitespace outside.
    fn wrap(&self, doc: &Document, id: NodeId, delimiter: &str) -> String {
        let content = self.inline_children(doc, id);
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return content;
        }
        let leading = if content.starts_with(char::is_whitespace) { " " } else { "" };
        let trailing = if content.ends_with(char::is_whitespace) { " " } else { "" };
        format!("{leading}{delimiter}{trimmed}{delimiter}{trailing}")
    }
}

fn flush_paragraph(inline: &mut String, out: &mut Vec<String>) {
    let paragraph = clean_inline(inline);
    if !paragraph.is_empty() {
        out.push(paragraph);
    }
    inline.clear();
}

fn flush_inline(inline: &mut String, parts: &mut Vec<String>, tight: bool) {
    let text = clean_inline(inline);
    if !text.is_empty() {
        let sep = if parts.is_empty() || tight { "" } else { "\n\n" };
        parts.push(format!("{}{}", sep, text));
    }
    inline.clear();
}

/// Trim each line of inline content; line breaks become hard breaks.
fn clean_inline(inline: &str) -> String {
    let lines: Vec<&str> = inline
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let joined = lines.join("  \n");
    escape_line_start(&joined)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text at the start of a paragraph that would otherwise read as block syntax.
fn escape_line_start(text: &str) -> String {
    let needs_escape = text.starts_with('#')
        || text.starts_with('>')
        || text.starts_with("- ")
        || text.starts_with("+ ")
        || text.starts_with("***")
        || {
            let digits = text.chars().take_while(char::is_ascii_digit).count();
            digits > 0 && text[digits..].starts_with(". ")
        };
    if !needs_escape {
        return text.to_string();
    }
    if text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let digits = text.chars().take_while(char::is_ascii_digit).count();
        return format!("{}\\{}", &text[..digits], &text[digits..]);
    }
    format!("\\{}", text)
}

fn link_destination(href: &str) -> String {
    if href.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", href.replace('<', "%3C").replace('>', "%3E"))
    } else {
        href.to_string()
    }
}

fn longest_run(text: &str, needle: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == needle {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        GfmConverter::default().convert(&Document::parse(html))
    }

    #[test]
    fn headings_and_paragraphs() {
        assert_eq!(
            md("<h1 id='x'>Title</h1><p>Hello <b>bold</b> and <i>soft</i></p><h3>Sub</h3>"),
            "# Title\n\nHello **bold** and _soft_\n\n### Sub\n"
        );
    }

    #[test]
    fn rules_and_line_breaks() {
        assert_eq!(md("<p>one<br>two</p><hr><p>three</p>"), "one  \ntwo\n\n***\n\nthree\n");
    }

    #[test]
    fn bullet_and_ordered_lists() {
        assert_eq!(
            md("<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul><ol start='3'><li>x</li><li>y</li></ol>"),
            "- a\n- b\n  - c\n\n3. x\n4. y\n"
        );
    }

    #[test]
    fn task_items() {
        assert_eq!(
            md("<ul><li><input type='checkbox' checked> done</li><li><input type='checkbox'> todo</li></ul>"),
            "- [x] done\n- [ ] todo\n"
        );
        assert_eq!(
            md("<ul class='checklist'><li class='checked'>done</li><li>todo</li></ul>"),
            "- [x] done\n- [ ] todo\n"
        );
    }

    #[test]
    fn fenced_code_keeps_whitespace() {
        assert_eq!(
            md("<pre><code class='language-rust'>fn main() {\n    x &lt; y;\n}\n</code></pre>"),
            "```rust\nfn main() {\n    x < y;\n}\n```\n"
        );
    }

    #[test]
    fn inline_code_links_and_images() {
        assert_eq!(
            md(r#"<p>Run <code>cargo</code> see <a href="https://x.io/a b">docs</a> <img src="pic.png" alt="Pic"></p>"#),
            "Run `cargo` see [docs](<https://x.io/a b>) ![Pic](pic.png)\n"
        );
    }

    #[test]
    fn tables() {
        assert_eq!(
            md("<table><thead><tr><th>Name</th><th>Qty</th></tr></thead><tbody><tr><td>a|b</td><td>1</td></tr><tr><td>c</td></tr></tbody></table>"),
            "| Name | Qty |\n| --- | --- |\n| a\\|b | 1 |\n| c |  |\n"
        );
    }

    #[test]
    fn strikethrough_and_blockquote() {
        assert_eq!(
            md("<blockquote><p>quoted <del>gone</del></p><p>second</p></blockquote>"),
            "> quoted ~~gone~~\n>\n> second\n"
        );
    }

    #[test]
    fn escapes_markdown_characters() {
        assert_eq!(md("<p>snake_case *star* # not heading</p>"), "snake\\_case \\*star\\* # not heading\n");
        assert_eq!(md("<p># literal</p>"), "\\# literal\n");
        assert_eq!(md("<p>1. not a list</p>"), "1\\. not a list\n");
    }

    #[test]
    fn whitespace_between_blocks_is_ignored() {
        assert_eq!(md("\n<div>\n  <p>a</p>\n  <p>b</p>\n</div>\n"), "a\n\nb\n");
    }

    #[test]
    fn empty_document() {
        assert_eq!(md(""), "");
        assert_eq!(md("<p> </p>"), "");
    }
}
