//! Slim CSS selector subset for locating elements: tag, `#id`, `.class`,
//! `[attr]`, `[attr=value]`, compound simple selectors, the descendant
//! combinator and comma-separated groups.

use crate::dom::{Dom, NodeId};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    /// Comma-separated groups, each a descendant chain of steps.
    groups: Vec<Vec<SelectorStep>>,
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    let mut groups = Vec::new();
    for group in selector.split(',') {
        let group = group.trim();
        if group.is_empty() {
            return Err(Error::UnsupportedSelector(selector.to_string()));
        }
        let mut steps = Vec::new();
        for step in group.split_whitespace() {
            steps.push(parse_step(step, selector)?);
        }
        if steps.is_empty() {
            return Err(Error::UnsupportedSelector(selector.to_string()));
        }
        groups.push(steps);
    }
    if groups.is_empty() {
        return Err(Error::UnsupportedSelector(selector.to_string()));
    }
    Ok(Selector { groups })
}

fn parse_step(step: &str, whole: &str) -> Result<SelectorStep> {
    let mut out = SelectorStep::default();
    let mut rest = step;

    let tag_end = rest
        .find(['#', '.', '['])
        .unwrap_or(rest.len());
    if tag_end > 0 {
        let tag = &rest[..tag_end];
        if tag != "*" {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(Error::UnsupportedSelector(whole.to_string()));
            }
            out.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_end..];
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let end = after.find(['#', '.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(Error::UnsupportedSelector(whole.to_string()));
            }
            out.id = Some(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['#', '.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(Error::UnsupportedSelector(whole.to_string()));
            }
            out.classes.push(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| Error::UnsupportedSelector(whole.to_string()))?;
            let body = &after[..end];
            let condition = match body.split_once('=') {
                Some((key, value)) => AttrCondition::Eq {
                    key: key.trim().to_ascii_lowercase(),
                    value: value.trim().trim_matches(['"', '\'']).to_string(),
                },
                None => AttrCondition::Exists {
                    key: body.trim().to_ascii_lowercase(),
                },
            };
            out.attrs.push(condition);
            rest = &after[end + 1..];
        } else {
            return Err(Error::UnsupportedSelector(whole.to_string()));
        }
    }
    Ok(out)
}

fn step_matches(dom: &Dom, node: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(node) else {
        return false;
    };
    if let Some(tag) = &step.tag {
        if element.tag_name != *tag {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if element.attrs.get("id") != Some(id) {
            return false;
        }
    }
    for class in &step.classes {
        let listed = element
            .attrs
            .get("class")
            .map(|list| list.split_whitespace().any(|c| c == class))
            .unwrap_or(false);
        if !listed {
            return false;
        }
    }
    for condition in &step.attrs {
        let ok = match condition {
            AttrCondition::Exists { key } => element.attrs.contains_key(key),
            AttrCondition::Eq { key, value } => element.attrs.get(key) == Some(value),
        };
        if !ok {
            return false;
        }
    }
    true
}

fn chain_matches(dom: &Dom, node: NodeId, steps: &[SelectorStep]) -> bool {
    let Some((last, ancestors)) = steps.split_last() else {
        return false;
    };
    if !step_matches(dom, node, last) {
        return false;
    }
    // Remaining steps must match some ancestors, outermost first.
    let mut pending = ancestors;
    let mut cursor = dom.parent(node);
    while let Some(current) = cursor {
        let Some((step, rest)) = pending.split_last() else {
            break;
        };
        if step_matches(dom, current, step) {
            pending = rest;
        }
        cursor = dom.parent(current);
    }
    pending.is_empty()
}

pub(crate) fn matches(dom: &Dom, node: NodeId, selector: &Selector) -> bool {
    selector
        .groups
        .iter()
        .any(|steps| chain_matches(dom, node, steps))
}

pub(crate) fn select_all(dom: &Dom, selector: &Selector) -> Vec<NodeId> {
    dom.all_element_nodes()
        .into_iter()
        .filter(|node| matches(dom, *node, selector))
        .collect()
}
