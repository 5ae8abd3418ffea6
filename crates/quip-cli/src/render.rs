//! CommonMark rendering with Obsidian's markup for links, embeds and
//! front matter.
//!
//! - `[[Note|alias]]` → `<a class="internal-link" data-href="Note" href="Note">alias</a>`
//! - `![[Note]]`, `![[image.png]]` → `<span class="internal-embed" src="...">`
//! - YAML front matter → `<pre class="frontmatter">` ahead of the body
//!
//! Wiki links inside code are left as written.

use async_trait::async_trait;
use obsidian_fs::split_frontmatter;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use quip_sync::html::Document;
use quip_sync::{RenderError, Renderer};
use wiki_links::{find_wiki_links, WikiLink};

#[derive(Debug, Default, Clone, Copy)]
pub struct ObsidianRenderer;

#[async_trait]
impl Renderer for ObsidianRenderer {
    async fn render(&self, markdown: &str, source_path: &str) -> Result<String, RenderError> {
        let html = render_markdown(markdown);
        tracing::debug!(path = source_path, bytes = html.len(), "Rendered note");
        Ok(html)
    }
}

pub fn render_markdown(markdown: &str) -> String {
    let (yaml, body) = split_frontmatter(markdown);

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let mut events = Vec::new();
    let mut code_depth = 0usize;
    for event in TextMergeStream::new(Parser::new_ext(body, options)) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                code_depth += 1;
                events.push(Event::Start(Tag::CodeBlock(kind)));
            }
            Event::End(TagEnd::CodeBlock) => {
                code_depth = code_depth.saturating_sub(1);
                events.push(Event::End(TagEnd::CodeBlock));
            }
            Event::Text(text) if code_depth == 0 => expand_wiki_links(text, &mut events),
            other => events.push(other),
        }
    }

    let mut html = yaml.map(frontmatter_html).unwrap_or_default();
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

fn expand_wiki_links<'a>(text: CowStr<'a>, out: &mut Vec<Event<'a>>) {
    let links = find_wiki_links(&text);
    if links.is_empty() {
        out.push(Event::Text(text));
        return;
    }

    let mut cursor = 0;
    for link in &links {
        if link.span.start > cursor {
            out.push(Event::Text(text[cursor..link.span.start].to_string().into()));
        }
        out.push(Event::InlineHtml(wiki_link_html(link).into()));
        cursor = link.span.end;
    }
    if cursor < text.len() {
        out.push(Event::Text(text[cursor..].to_string().into()));
    }
}

fn wiki_link_html(link: &WikiLink) -> String {
    let mut doc = Document::new();
    let display = link.display_text().to_string();
    let element = if link.is_embed {
        doc.create_element(
            "span",
            vec![
                ("class".to_string(), "internal-embed".to_string()),
                ("src".to_string(), link.target.clone()),
                ("alt".to_string(), display.clone()),
            ],
        )
    } else {
        doc.create_element(
            "a",
            vec![
                ("class".to_string(), "internal-link".to_string()),
                ("data-href".to_string(), link.target.clone()),
                ("href".to_string(), link.target.clone()),
            ],
        )
    };
    let text = doc.create_text(&display);
    doc.append_child(element, text);
    doc.outer_html(element)
}

fn frontmatter_html(yaml: &str) -> String {
    let mut doc = Document::new();
    let pre = doc.create_element(
        "pre",
        vec![("class".to_string(), "frontmatter language-yaml".to_string())],
    );
    let code = doc.create_element(
        "code",
        vec![("class".to_string(), "language-yaml".to_string())],
    );
    let text = doc.create_text(yaml);
    doc.append_child(code, text);
    doc.append_child(pre, code);
    doc.outer_html(pre)
}
