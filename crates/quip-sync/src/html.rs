//! Minimal HTML tree for post-processing rendered notes and fetched documents.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Detached nodes stay in the arena but are no longer reachable
//! from the root, so ids never dangle.
//!
//! The parser is forgiving in the way browsers are for the markup we see in
//! practice: void elements, unquoted attributes, raw-text `script`/`style`,
//! implied `</p>` and `</li>`, and stray end tags are all handled. It is not
//! a full HTML5 tree builder.

use std::fmt::Write as _;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Fragment,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Opening one of these closes an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Removed entirely by [`Document::sanitize`].
const UNSAFE_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed", "noscript"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the fragment root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Fragment,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn parse(html: &str) -> Self {
        let mut doc = Self::new();
        Parser::new(html, &mut doc).run();
        doc
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            match el.attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[id].kind {
            el.attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id].parent?;
        let siblings = &self.nodes[parent].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    /// All nodes under `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Elements reachable from the root matching `predicate`, in document order.
    pub fn select<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Element) -> bool,
    {
        self.descendants(self.root())
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(&predicate))
            .collect()
    }

    pub fn elements_by_tag(&self, name: &str) -> Vec<NodeId> {
        self.select(|el| el.name == name)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(t) = &self.nodes[id].kind {
            out.push_str(t);
        }
        for node in self.descendants(id) {
            if let NodeKind::Text(t) = &self.nodes[node].kind {
                out.push_str(t);
            }
        }
        out
    }

    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeKind::Element(Element {
            name: name.to_ascii_lowercase(),
            attrs,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Remove `id` from its parent. The subtree stays intact and can be reinserted.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Insert `node` as the previous sibling of `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.nodes[reference].parent else {
            return;
        };
        self.detach(node);
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == reference)
            .unwrap_or(0);
        self.nodes[node].parent = Some(parent);
        self.nodes[parent].children.insert(pos, node);
    }

    /// Replace `id` with `replacements`, in order.
    pub fn replace_with(&mut self, id: NodeId, replacements: &[NodeId]) {
        for &node in replacements {
            self.insert_before(id, node);
        }
        self.detach(id);
    }

    /// Replace an element with its own children.
    pub fn unwrap(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        self.replace_with(id, &children);
    }

    /// Copy the top-level nodes of `other` into this arena, unattached.
    pub fn import_fragment(&mut self, other: &Document) -> Vec<NodeId> {
        other.nodes[other.root()]
            .children
            .iter()
            .map(|&child| self.import_node(other, child))
            .collect()
    }

    fn import_node(&mut self, other: &Document, id: NodeId) -> NodeId {
        let copy = self.push(other.nodes[id].kind.clone());
        for &child in &other.nodes[id].children {
            let child_copy = self.import_node(other, child);
            self.nodes[child_copy].parent = Some(copy);
            self.nodes[copy].children.push(child_copy);
        }
        copy
    }

    /// Drop active content: script-like elements, `on*` handlers and
    /// `javascript:` URLs.
    pub fn sanitize(&mut self) {
        for id in self.select(|el| UNSAFE_ELEMENTS.contains(&el.name.as_str())) {
            self.detach(id);
        }
        for id in self.select(|_| true) {
            if let NodeKind::Element(el) = &mut self.nodes[id].kind {
                el.attrs.retain(|(name, value)| {
                    if name.starts_with("on") {
                        return false;
                    }
                    let is_url = matches!(name.as_str(), "href" | "src" | "action" | "formaction");
                    !(is_url && is_javascript_url(value))
                });
            }
        }
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag_name(id)
            .is_some_and(|name| RAW_TEXT_ELEMENTS.contains(&name));
        for &child in &self.nodes[id].children {
            self.write_node(child, raw, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Fragment => out.push_str(&self.inner_html(id)),
            NodeKind::Text(t) if raw_text => out.push_str(t),
            NodeKind::Text(t) => escape_text(t, out),
            NodeKind::Comment(c) => {
                let _ = write!(out, "<!--{}-->", c);
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
                out.push('>');
                if is_void(&el.name) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                let _ = write!(out, "</{}>", el.name);
            }
        }
    }
}

fn is_javascript_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .take(11)
        .collect();
    compact.to_ascii_lowercase().starts_with("javascript:")
}

/// Escape `text` for use as element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_text(text, &mut out);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

/// Decode character references. Unknown named references are kept verbatim.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_one(rest) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode one reference at the start of `s` (which begins with '&').
fn decode_one(s: &str) -> Option<(char, usize)> {
    let end = s[1..].find(';').map(|p| p + 1).filter(|&p| p <= 32)?;
    let body = &s[1..end];
    let decoded = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        char::from_u32(code).unwrap_or('\u{fffd}')
    } else {
        match body {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            "nbsp" => '\u{a0}',
            "ndash" => '\u{2013}',
            "mdash" => '\u{2014}',
            "hellip" => '\u{2026}',
            "lsquo" => '\u{2018}',
            "rsquo" => '\u{2019}',
            "ldquo" => '\u{201c}',
            "rdquo" => '\u{201d}',
            "bull" => '\u{2022}',
            "middot" => '\u{b7}',
            "copy" => '\u{a9}',
            "reg" => '\u{ae}',
            "trade" => '\u{2122}',
            "times" => '\u{d7}',
            "rarr" => '\u{2192}',
            "larr" => '\u{2190}',
            _ => return None,
        }
    };
    Some((decoded, end + 1))
}

struct Parser<'a, 'd> {
    input: &'a str,
    pos: usize,
    doc: &'d mut Document,
    /// Open elements; the root is always at the bottom
    stack: Vec<NodeId>,
}

impl<'a, 'd> Parser<'a, 'd> {
    fn new(input: &'a str, doc: &'d mut Document) -> Self {
        let root = doc.root();
        Self {
            input,
            pos: 0,
            doc,
            stack: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(0)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn run(&mut self) {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if let Some(after) = rest.strip_prefix("<!--") {
                let (comment, consumed) = match after.find("-->") {
                    Some(end) => (&after[..end], 4 + end + 3),
                    None => (after, rest.len()),
                };
                let node = self.doc.push(NodeKind::Comment(comment.to_string()));
                self.doc.append_child(self.current(), node);
                self.pos += consumed;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                // doctype / processing instruction
                self.pos += rest.find('>').map(|p| p + 1).unwrap_or(rest.len());
            } else if rest.starts_with("</") && starts_tag_name(&rest[2..]) {
                self.end_tag();
            } else if rest.starts_with('<') && starts_tag_name(&rest[1..]) {
                self.start_tag();
            } else {
                self.text();
            }
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // A lone '<' that does not open a tag is literal text
        let skip = usize::from(rest.starts_with('<'));
        let len = rest[skip..].find('<').map(|p| p + skip).unwrap_or(rest.len());
        self.push_text(&decode_entities(&rest[..len]));
        self.pos += len;
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(&last) = self.doc.nodes[parent].children.last() {
            if let NodeKind::Text(existing) = &mut self.doc.nodes[last].kind {
                existing.push_str(text);
                return;
            }
        }
        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node);
    }

    fn end_tag(&mut self) {
        let rest = self.rest();
        let close = rest.find('>').map(|p| p + 1).unwrap_or(rest.len());
        let name = tag_name(&rest[2..]);
        self.pos += close;

        let open = self
            .stack
            .iter()
            .rposition(|&id| self.doc.tag_name(id) == Some(name.as_str()))
            .filter(|&depth| depth > 0);
        if let Some(depth) = open {
            self.stack.truncate(depth);
        } else if name == "p" {
            // `</p>` with no open paragraph produces an empty one
            let p = self.doc.create_element("p", Vec::new());
            self.doc.append_child(self.current(), p);
        }
    }

    fn start_tag(&mut self) {
        let (element, self_closing, consumed) = parse_start_tag(self.rest());
        self.pos += consumed;
        let name = element.name.clone();

        self.close_implied(&name);

        let id = self.doc.push(NodeKind::Element(element));
        self.doc.append_child(self.current(), id);

        if is_void(&name) || self_closing {
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let rest = self.rest();
            let closing = format!("</{}", name);
            let end = find_ascii_case_insensitive(rest, &closing).unwrap_or(rest.len());
            if end > 0 {
                let text = self.doc.create_text(&rest[..end]);
                self.doc.append_child(id, text);
            }
            self.pos += end;
            let rest = self.rest();
            self.pos += rest.find('>').map(|p| p + 1).unwrap_or(rest.len());
            return;
        }

        self.stack.push(id);
    }

    fn close_implied(&mut self, opening: &str) {
        if CLOSES_PARAGRAPH.contains(&opening) {
            self.close_if_open("p", &["div", "blockquote", "li", "td", "th", "section"]);
        }
        match opening {
            "li" => self.close_if_open("li", &["ul", "ol"]),
            "dt" | "dd" => {
                self.close_if_open("dt", &["dl"]);
                self.close_if_open("dd", &["dl"]);
            }
            "tr" => self.close_if_open("tr", &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => {
                self.close_if_open("td", &["tr", "table"]);
                self.close_if_open("th", &["tr", "table"]);
            }
            "thead" | "tbody" | "tfoot" => {
                for name in ["td", "th", "tr", "thead", "tbody", "tfoot"] {
                    self.close_if_open(name, &["table"]);
                }
            }
            "option" => self.close_if_open("option", &["select"]),
            _ => {}
        }
    }

    /// Pop up to and including the nearest open `name`, unless a `boundary`
    /// element is open above it.
    fn close_if_open(&mut self, name: &str, boundaries: &[&str]) {
        for depth in (1..self.stack.len()).rev() {
            let Some(tag) = self.doc.tag_name(self.stack[depth]) else {
                continue;
            };
            if tag == name {
                self.stack.truncate(depth);
                return;
            }
            if boundaries.contains(&tag) {
                return;
            }
        }
    }
}

fn starts_tag_name(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn tag_name(s: &str) -> String {
    s.chars()
        .take_while(|c| !c.is_ascii_whitespace() && *c != '>' && *c != '/')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Parse `<name attr=value ...>` at the start of `s`.
///
/// Returns the element, whether it was self-closing, and bytes consumed.
fn parse_start_tag(s: &str) -> (Element, bool, usize) {
    let bytes = s.as_bytes();
    let name = tag_name(&s[1..]);
    let mut i = 1 + name.len();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = bytes.get(i + 1) == Some(&b'>');
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        if i == name_start {
            // Stray '=' or similar; skip it
            i += 1;
            continue;
        }
        let attr_name = s[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let start = i + 1;
                    let end = s[start..]
                        .find(q as char)
                        .map(|p| start + p)
                        .unwrap_or(s.len());
                    value = decode_entities(&s[start..end]);
                    i = (end + 1).min(s.len());
                }
                Some(_) => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&s[start..i]);
                }
                None => {}
            }
        }

        if !attrs.iter().any(|(k, _)| *k == attr_name) {
            attrs.push((attr_name, value));
        }
    }

    (Element { name, attrs }, self_closing, i)
}
