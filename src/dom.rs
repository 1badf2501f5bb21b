//! Arena-backed DOM with the input-control semantics the typing engine
//! observes: value sanitization for number/date controls, per-element
//! selection ranges, maxlength, contenteditable detection and shadow trees.

use std::collections::HashMap;

use crate::edit::{self, char_len};
use crate::{Error, Result};

/// Opaque handle to a node in the harness DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    /// Root of a detached shadow subtree; its host is tracked on the arena.
    ShadowRoot,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: HashMap<String, String>,
    pub(crate) value: String,
    pub(crate) sel_start: usize,
    pub(crate) sel_end: usize,
    pub(crate) checked: bool,
    pub(crate) shadow_root: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    /// Shadow-subtree root -> host element.
    shadow_hosts: HashMap<NodeId, NodeId>,
}

/// Input types whose selection range is scriptable. Everything else
/// (number, date, email, ...) reports no range and edits append at the end.
const SELECTION_INPUT_TYPES: [&str; 5] = ["text", "search", "url", "tel", "password"];

const CLICKABLE_INPUT_TYPES: [&str; 6] = ["button", "color", "file", "image", "reset", "submit"];

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            shadow_hosts: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let element = Element {
            tag_name,
            attrs,
            value,
            sel_start: 0,
            sel_end: 0,
            checked,
            shadow_root: None,
        };
        self.create_node(Some(parent), NodeType::Element(element))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn has_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id) == Some(tag)
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id).and_then(|e| e.attrs.get(name).cloned())
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node_id) {
            element.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node_id) {
            element.attrs.remove(name);
        }
    }

    pub(crate) fn disabled(&self, node_id: NodeId) -> bool {
        self.element(node_id)
            .map(|e| e.attrs.contains_key("disabled"))
            .unwrap_or(false)
    }

    pub(crate) fn readonly(&self, node_id: NodeId) -> bool {
        self.element(node_id)
            .map(|e| e.attrs.contains_key("readonly"))
            .unwrap_or(false)
    }

    pub(crate) fn checked(&self, node_id: NodeId) -> bool {
        self.element(node_id).map(|e| e.checked).unwrap_or(false)
    }

    pub(crate) fn set_checked(&mut self, node_id: NodeId, checked: bool) {
        if let Some(element) = self.element_mut(node_id) {
            element.checked = checked;
        }
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document | NodeType::ShadowRoot | NodeType::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.text_content(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
        }
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) {
        if self.element(node_id).is_none() {
            return;
        }
        self.nodes[node_id.0].children.clear();
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
    }

    pub(crate) fn is_contenteditable(&self, node_id: NodeId) -> bool {
        match self.attr(node_id, "contenteditable") {
            Some(value) => value.is_empty() || value == "true",
            None => false,
        }
    }

    /// The effective `type` of an `<input>`; missing value defaults to text.
    pub(crate) fn input_kind(&self, node_id: NodeId) -> Option<String> {
        if !self.has_tag(node_id, "input") {
            return None;
        }
        let kind = self
            .attr(node_id, "type")
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "text".to_string());
        Some(kind.to_ascii_lowercase())
    }

    pub(crate) fn supports_selection(&self, node_id: NodeId) -> bool {
        if self.has_tag(node_id, "textarea") {
            return true;
        }
        match self.input_kind(node_id) {
            Some(kind) => SELECTION_INPUT_TYPES.contains(&kind.as_str()),
            None => false,
        }
    }

    pub(crate) fn has_scalar_value(&self, node_id: NodeId) -> bool {
        matches!(
            self.tag_name(node_id),
            Some("input" | "textarea" | "select" | "option" | "button")
        )
    }

    pub(crate) fn value(&self, node_id: NodeId) -> Option<String> {
        if self.has_scalar_value(node_id) {
            self.element(node_id).map(|e| e.value.clone())
        } else {
            None
        }
    }

    /// Writes a control value, applying the per-type sanitization a browser
    /// would: an invalid number or date becomes the empty string. A
    /// programmatic write also collapses the stored selection to the end.
    pub(crate) fn set_value(&mut self, node_id: NodeId, raw: &str) {
        let sanitized = match self.input_kind(node_id).as_deref() {
            Some("number") if !raw.is_empty() && !edit::is_valid_number_string(raw) => {
                String::new()
            }
            Some("date") if !raw.is_empty() && !edit::is_valid_date_string(raw) => String::new(),
            _ => raw.to_string(),
        };
        let len = char_len(&sanitized);
        if let Some(element) = self.element_mut(node_id) {
            element.value = sanitized;
            element.sel_start = len;
            element.sel_end = len;
        }
    }

    pub(crate) fn selection(&self, node_id: NodeId) -> Option<(usize, usize)> {
        if !self.supports_selection(node_id) {
            return None;
        }
        self.element(node_id).map(|e| (e.sel_start, e.sel_end))
    }

    pub(crate) fn set_selection(&mut self, node_id: NodeId, start: usize, end: usize) {
        let len = self
            .element(node_id)
            .map(|e| char_len(&e.value))
            .unwrap_or(0);
        if let Some(element) = self.element_mut(node_id) {
            element.sel_start = start.min(len);
            element.sel_end = end.min(len);
        }
    }

    /// `maxlength`, read from the attribute map (not a cached property) and
    /// only for the control types that honor it. The `telephone` entry is
    /// deliberate: a real `type=tel` input is outside the list.
    pub(crate) fn max_length(&self, node_id: NodeId) -> Option<usize> {
        let supported = if self.has_tag(node_id, "textarea") {
            true
        } else {
            matches!(
                self.input_kind(node_id).as_deref(),
                Some("email" | "password" | "search" | "telephone" | "text" | "url")
            )
        };
        if !supported {
            return None;
        }
        self.attr(node_id, "maxlength")?.parse::<usize>().ok()
    }

    pub(crate) fn is_clickable(&self, node_id: NodeId) -> bool {
        if self.has_tag(node_id, "button") {
            return true;
        }
        match self.input_kind(node_id) {
            Some(kind) => CLICKABLE_INPUT_TYPES.contains(&kind.as_str()),
            None => false,
        }
    }

    pub(crate) fn all_element_nodes(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.element(*id).is_some())
            .collect()
    }

    pub(crate) fn descendants_by_tag(&self, node_id: NodeId, tag: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants_by_tag(node_id, tag, &mut out);
        out
    }

    fn collect_descendants_by_tag(&self, node_id: NodeId, tag: &str, out: &mut Vec<NodeId>) {
        for child in &self.nodes[node_id.0].children {
            if self.has_tag(*child, tag) {
                out.push(*child);
            }
            self.collect_descendants_by_tag(*child, tag, out);
        }
    }

    pub(crate) fn find_ancestor_by_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if self.has_tag(current, tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Root of the tree `node_id` lives in: the document, or a shadow root.
    pub(crate) fn tree_root(&self, node_id: NodeId) -> NodeId {
        let mut cursor = node_id;
        while let Some(parent) = self.parent(cursor) {
            cursor = parent;
        }
        cursor
    }

    pub(crate) fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.element(host).and_then(|e| e.shadow_root) {
            return existing;
        }
        let root = self.create_node(None, NodeType::ShadowRoot);
        if let Some(element) = self.element_mut(host) {
            element.shadow_root = Some(root);
        }
        self.shadow_hosts.insert(root, host);
        root
    }

    pub(crate) fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host).and_then(|e| e.shadow_root)
    }

    pub(crate) fn host_of(&self, shadow_root: NodeId) -> Option<NodeId> {
        self.shadow_hosts.get(&shadow_root).copied()
    }

    /// A `<textarea>` without a `value` attribute takes its initial value
    /// from its text content.
    pub(crate) fn init_textarea_values(&mut self, under: NodeId) {
        for node in self.descendants_by_tag(under, "textarea") {
            if self.attr(node, "value").is_none() {
                let text = self.text_content(node);
                if let Some(element) = self.element_mut(node) {
                    element.value = text;
                }
            }
        }
    }
}

const VOID_TAGS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Compact HTML fragment parser for test fixtures: tags, attributes, text,
/// comments, void and self-closing elements. Whitespace-only text nodes are
/// dropped so indented fixtures stay deterministic.
pub(crate) fn parse_fragment(dom: &mut Dom, parent: NodeId, html: &str) -> Result<()> {
    let mut stack: Vec<NodeId> = vec![parent];
    let mut rest = html;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| Error::HtmlParse("unterminated comment".into()))?;
            rest = &after[end + 3..];
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after
                .find('>')
                .ok_or_else(|| Error::HtmlParse("unterminated end tag".into()))?;
            let tag = after[..end].trim().to_ascii_lowercase();
            close_tag(dom, &mut stack, parent, &tag);
            rest = &after[end + 1..];
        } else if rest.starts_with('<') {
            rest = parse_start_tag(dom, &mut stack, rest)?;
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = decode_entities(&rest[..end]);
            if !text.trim().is_empty() {
                let current = *stack.last().unwrap_or(&parent);
                dom.create_text(current, text);
            }
            rest = &rest[end..];
        }
    }
    Ok(())
}

fn close_tag(dom: &Dom, stack: &mut Vec<NodeId>, parent: NodeId, tag: &str) {
    // Pop to the nearest matching open element; an unmatched end tag is
    // ignored, matching lenient browser parsing.
    let matching = stack
        .iter()
        .rposition(|node| *node != parent && dom.has_tag(*node, tag));
    if let Some(idx) = matching {
        stack.truncate(idx);
    }
}

fn parse_start_tag<'a>(dom: &mut Dom, stack: &mut Vec<NodeId>, rest: &'a str) -> Result<&'a str> {
    let after = &rest[1..];
    let name_end = after
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .ok_or_else(|| Error::HtmlParse("unterminated start tag".into()))?;
    let tag = after[..name_end].to_ascii_lowercase();
    if tag.is_empty() {
        return Err(Error::HtmlParse(format!(
            "malformed tag near: {}",
            error_context(rest)
        )));
    }

    let mut cursor = &after[name_end..];
    let mut attrs = HashMap::new();
    let self_closing;
    loop {
        cursor = cursor.trim_start();
        if let Some(after_close) = cursor.strip_prefix("/>") {
            self_closing = true;
            cursor = after_close;
            break;
        }
        if let Some(after_close) = cursor.strip_prefix('>') {
            self_closing = false;
            cursor = after_close;
            break;
        }
        if cursor.is_empty() {
            return Err(Error::HtmlParse(format!("unterminated <{tag}> tag")));
        }
        cursor = parse_attr(cursor, &mut attrs)?;
    }

    let parent = *stack.last().ok_or_else(|| {
        Error::HtmlParse("element stack underflow".into())
    })?;
    let node = dom.create_element(parent, tag.clone(), attrs);
    if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
        stack.push(node);
    }
    Ok(cursor)
}

// Truncates on a char boundary so error messages never split a multibyte
// character.
fn error_context(text: &str) -> String {
    text.chars().take(24).collect()
}

fn parse_attr<'a>(cursor: &'a str, attrs: &mut HashMap<String, String>) -> Result<&'a str> {
    let name_end = cursor
        .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
        .unwrap_or(cursor.len());
    if name_end == 0 {
        return Err(Error::HtmlParse(format!(
            "malformed attribute near: {}",
            error_context(cursor)
        )));
    }
    let name = cursor[..name_end].to_ascii_lowercase();
    let mut rest = cursor[name_end..].trim_start();

    let value = if let Some(after_eq) = rest.strip_prefix('=') {
        let after_eq = after_eq.trim_start();
        if let Some(quoted) = after_eq.strip_prefix('"') {
            let end = quoted
                .find('"')
                .ok_or_else(|| Error::HtmlParse(format!("unterminated value for {name}")))?;
            rest = &quoted[end + 1..];
            decode_entities(&quoted[..end])
        } else if let Some(quoted) = after_eq.strip_prefix('\'') {
            let end = quoted
                .find('\'')
                .ok_or_else(|| Error::HtmlParse(format!("unterminated value for {name}")))?;
            rest = &quoted[end + 1..];
            decode_entities(&quoted[..end])
        } else {
            let end = after_eq
                .find(|c: char| c.is_whitespace() || c == '>')
                .unwrap_or(after_eq.len());
            rest = &after_eq[end..];
            after_eq[..end].to_string()
        }
    } else {
        String::new()
    };

    attrs.insert(name, value);
    Ok(rest)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
