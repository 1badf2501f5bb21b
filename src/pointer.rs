//! Pointer collaborators for the typing engine: hover/unhover sequences and
//! the click simulation that establishes focus, including label-control
//! redirection and checkbox/radio/submit activation.

use crate::dom::NodeId;
use crate::events::{EventInit, mouse_init};
use crate::harness::Harness;
use crate::Result;

impl Harness {
    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.click_node(target)
    }

    pub fn hover(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.hover_node(target);
        Ok(())
    }

    pub fn unhover(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.unhover_node(target);
        Ok(())
    }

    pub(crate) fn click_node(&mut self, target: NodeId) -> Result<()> {
        self.hover_node(target);
        match self.dom.tag_name(target) {
            Some("label") => self.click_label(target),
            Some("input")
                if matches!(
                    self.dom.input_kind(target).as_deref(),
                    Some("checkbox" | "radio")
                ) =>
            {
                self.click_boolean(target)
            }
            _ => self.click_plain(target),
        }
    }

    fn click_label(&mut self, label: NodeId) -> Result<()> {
        if self.is_label_with_disabled_control(label) {
            return Ok(());
        }
        self.dispatch(label, "pointerdown", EventInit::default());
        self.dispatch(label, "mousedown", mouse_init("mousedown", 0));
        self.dispatch(label, "pointerup", EventInit::default());
        self.dispatch(label, "mouseup", mouse_init("mouseup", 0));
        self.dispatch(label, "click", mouse_init("click", 0));
        // Clicking the label activates the control; it does not focus it on
        // its own, so the focus hand-off is explicit.
        if let Some(control) = self.label_control(label) {
            self.scoped(|h| h.focus_node(control))?;
        }
        Ok(())
    }

    fn click_boolean(&mut self, target: NodeId) -> Result<()> {
        let disabled = self.dom.disabled(target);
        self.dispatch(target, "pointerdown", EventInit::default());
        if !disabled {
            self.dispatch(target, "mousedown", mouse_init("mousedown", 0));
        }
        self.scoped(|h| h.focus_node(target))?;
        self.dispatch(target, "pointerup", EventInit::default());
        if !disabled {
            self.dispatch(target, "mouseup", mouse_init("mouseup", 0));
            self.fire_click_default(target, mouse_init("click", 0));
        }
        Ok(())
    }

    fn click_plain(&mut self, target: NodeId) -> Result<()> {
        let previous = self.focused.filter(|f| *f != target);
        let disabled = self.dom.disabled(target);

        self.dispatch(target, "pointerdown", EventInit::default());
        if !disabled {
            let proceed = !self
                .dispatch(target, "mousedown", mouse_init("mousedown", 0))
                .default_prevented();
            if proceed && self.resolve_active() != Some(target) {
                if previous.is_some() && !self.is_focusable(target) {
                    let prev = previous.unwrap_or(target);
                    self.scoped(|h| h.blur_node(prev))?;
                } else {
                    self.scoped(|h| h.focus_node(target))?;
                }
            }
        }

        self.dispatch(target, "pointerup", EventInit::default());
        if !disabled {
            self.dispatch(target, "mouseup", mouse_init("mouseup", 0));
            self.fire_click_default(target, mouse_init("click", 0));
            if let Some(label) = self.dom.find_ancestor_by_tag(target, "label") {
                if let Some(control) = self.label_control(label) {
                    self.scoped(|h| h.focus_node(control))?;
                }
            }
        }
        Ok(())
    }

    /// Dispatches `click` and runs the default activation behavior unless a
    /// listener prevented it: checkbox/radio state changes and form
    /// submission from submit controls.
    pub(crate) fn fire_click_default(&mut self, target: NodeId, init: EventInit) -> bool {
        let event = self.dispatch(target, "click", init);
        if event.default_prevented() {
            return false;
        }

        match self.dom.input_kind(target).as_deref() {
            Some("checkbox") => {
                let checked = self.dom.checked(target);
                self.dom.set_checked(target, !checked);
                self.dispatch(target, "input", EventInit::default());
                self.dispatch(target, "change", EventInit::default());
            }
            Some("radio") => {
                if !self.dom.checked(target) {
                    self.uncheck_other_radios_in_group(target);
                    self.dom.set_checked(target, true);
                    self.dispatch(target, "input", EventInit::default());
                    self.dispatch(target, "change", EventInit::default());
                }
            }
            _ => {}
        }

        if self.is_submit_control(target) {
            if let Some(form) = self.dom.find_ancestor_by_tag(target, "form") {
                self.dispatch(form, "submit", EventInit::default());
            }
        }
        true
    }

    fn is_submit_control(&self, node: NodeId) -> bool {
        if self.dom.has_tag(node, "button") {
            // A button without an explicit type submits by default.
            return matches!(
                self.dom.attr(node, "type").as_deref(),
                None | Some("submit") | Some("")
            );
        }
        matches!(
            self.dom.input_kind(node).as_deref(),
            Some("submit" | "image")
        )
    }

    fn uncheck_other_radios_in_group(&mut self, target: NodeId) {
        let group = self.dom.attr(target, "name").unwrap_or_default();
        if group.is_empty() {
            return;
        }
        let form = self.dom.find_ancestor_by_tag(target, "form");
        for node in self.dom.all_element_nodes() {
            if node == target {
                continue;
            }
            if self.dom.input_kind(node).as_deref() != Some("radio") {
                continue;
            }
            if self.dom.attr(node, "name").unwrap_or_default() != group {
                continue;
            }
            if self.dom.find_ancestor_by_tag(node, "form") != form {
                continue;
            }
            self.dom.set_checked(node, false);
        }
    }

    fn hover_node(&mut self, target: NodeId) {
        if self.is_label_with_disabled_control(target) {
            return;
        }
        let chain = self.ancestor_chain(target);
        let disabled = self.dom.disabled(target);

        self.dispatch(target, "pointerover", EventInit::default());
        for node in chain.iter().rev() {
            self.dispatch(*node, "pointerenter", EventInit::default());
        }
        if !disabled {
            self.dispatch(target, "mouseover", mouse_init("mouseover", 0));
            for node in chain.iter().rev() {
                self.dispatch(*node, "mouseenter", mouse_init("mouseenter", 0));
            }
        }
        self.dispatch(target, "pointermove", EventInit::default());
        if !disabled {
            self.dispatch(target, "mousemove", mouse_init("mousemove", 0));
        }
    }

    fn unhover_node(&mut self, target: NodeId) {
        if self.is_label_with_disabled_control(target) {
            return;
        }
        let chain = self.ancestor_chain(target);
        let disabled = self.dom.disabled(target);

        self.dispatch(target, "pointermove", EventInit::default());
        if !disabled {
            self.dispatch(target, "mousemove", mouse_init("mousemove", 0));
        }
        self.dispatch(target, "pointerout", EventInit::default());
        for node in &chain {
            self.dispatch(*node, "pointerleave", EventInit::default());
        }
        if !disabled {
            self.dispatch(target, "mouseout", mouse_init("mouseout", 0));
            for node in &chain {
                self.dispatch(*node, "mouseleave", mouse_init("mouseleave", 0));
            }
        }
    }

    /// The element and its ancestor elements, innermost first.
    fn ancestor_chain(&self, target: NodeId) -> Vec<NodeId> {
        let mut chain = vec![target];
        let mut cursor = self.dom.parent(target);
        while let Some(node) = cursor {
            if self.dom.element(node).is_some() {
                chain.push(node);
            }
            cursor = self.dom.parent(node);
        }
        chain
    }

    // ----- focusability -----

    pub(crate) fn is_focusable(&self, node: NodeId) -> bool {
        if self.is_label_with_disabled_control(node) {
            return false;
        }
        let Some(tag) = self.dom.tag_name(node) else {
            return false;
        };
        match tag {
            "input" => {
                self.dom.input_kind(node).as_deref() != Some("hidden")
                    && !self.dom.disabled(node)
            }
            "button" | "select" | "textarea" => !self.dom.disabled(node),
            "a" => self.dom.attr(node, "href").is_some(),
            _ => {
                self.dom.is_contenteditable(node)
                    || (self.dom.attr(node, "tabindex").is_some() && !self.dom.disabled(node))
            }
        }
    }

    /// No events at all fire on a label whose contained control is disabled.
    pub(crate) fn is_label_with_disabled_control(&self, node: NodeId) -> bool {
        if !self.dom.has_tag(node, "label") {
            return false;
        }
        match self.label_control(node) {
            Some(control) => {
                self.dom.disabled(control) && self.dom.is_descendant_of(control, node)
            }
            None => false,
        }
    }

    /// The control a label is associated with: its `for` target, or the
    /// first form control it contains.
    pub(crate) fn label_control(&self, label: NodeId) -> Option<NodeId> {
        if let Some(id) = self.dom.attr(label, "for") {
            return self
                .dom
                .all_element_nodes()
                .into_iter()
                .find(|node| self.dom.attr(*node, "id").as_deref() == Some(id.as_str()));
        }
        for tag in ["input", "select", "textarea", "button"] {
            if let Some(control) = self.dom.descendants_by_tag(label, tag).into_iter().next() {
                return Some(control);
            }
        }
        None
    }
}
