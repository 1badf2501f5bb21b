//! The deterministic runtime the simulated user acts against: DOM, listener
//! dispatch, focus tracking, the document selection, a virtual clock and the
//! recorded event trace.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::dom::{self, Dom, NodeId, NodeType};
use crate::edit::char_len;
use crate::events::{EventInit, EventState, ListenerStore};
use crate::selector::{self, Selector};
use crate::{Error, Result};

const TASK_STEP_LIMIT: usize = 10_000;
const EVENT_LOG_LIMIT: usize = 10_000;

/// Document-level selection used by contenteditable containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DocRange {
    pub(crate) node: NodeId,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

type TaskFn = Rc<RefCell<dyn FnMut(&mut Harness)>>;

struct ScheduledTask {
    id: i64,
    due_at: i64,
    order: i64,
    callback: TaskFn,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("focused", &self.focused)
            .field("doc_selection", &self.doc_selection)
            .field("now_ms", &self.now_ms)
            .finish_non_exhaustive()
    }
}

pub struct Harness {
    pub(crate) dom: Dom,
    listeners: ListenerStore,
    pub(crate) focused: Option<NodeId>,
    pub(crate) doc_selection: Option<DocRange>,
    tasks: Vec<ScheduledTask>,
    now_ms: i64,
    next_task_id: i64,
    next_task_order: i64,
    record_events: bool,
    event_log: VecDeque<String>,
}

impl Harness {
    pub fn from_html(html: &str) -> Result<Self> {
        let mut dom = Dom::new();
        let root = dom.root;
        dom::parse_fragment(&mut dom, root, html)?;
        dom.init_textarea_values(root);
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            focused: None,
            doc_selection: None,
            tasks: Vec::new(),
            now_ms: 0,
            next_task_id: 1,
            next_task_order: 0,
            record_events: false,
            event_log: VecDeque::new(),
        })
    }

    /// Attaches a shadow tree to `selector` and parses `html` into it.
    pub fn attach_shadow(&mut self, selector: &str, html: &str) -> Result<()> {
        let host = self.select_one(selector)?;
        let root = self.dom.attach_shadow(host);
        dom::parse_fragment(&mut self.dom, root, html)?;
        self.dom.init_textarea_values(root);
        Ok(())
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        let parsed = selector::parse_selector(selector)?;
        self.first_match(&parsed)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn first_match(&self, selector: &Selector) -> Option<NodeId> {
        selector::select_all(&self.dom, selector).into_iter().next()
    }

    // ----- listeners and dispatch -----

    /// Registers a bubble-phase listener.
    ///
    /// Listeners may re-enter the harness (type, click, dispatch more
    /// events), but a dispatch that reaches a listener already running
    /// further up the call stack skips that listener.
    pub fn on(
        &mut self,
        selector: &str,
        event: &str,
        callback: impl FnMut(&mut Harness, &mut EventState) + 'static,
    ) -> Result<()> {
        let node = self.select_one(selector)?;
        self.listeners
            .add(node, event, Rc::new(RefCell::new(callback)), false);
        Ok(())
    }

    /// Registers a capture-phase listener.
    pub fn on_capture(
        &mut self,
        selector: &str,
        event: &str,
        callback: impl FnMut(&mut Harness, &mut EventState) + 'static,
    ) -> Result<()> {
        let node = self.select_one(selector)?;
        self.listeners
            .add(node, event, Rc::new(RefCell::new(callback)), true);
        Ok(())
    }

    /// Dispatches a bare event at `selector`; returns whether the default
    /// action proceeds (no listener called `prevent_default`).
    pub fn fire_event(&mut self, selector: &str, event_type: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        let event = self.dispatch(target, event_type, EventInit::default());
        Ok(!event.default_prevented())
    }

    pub(crate) fn fire_cancellable(
        &mut self,
        target: NodeId,
        event_type: &str,
        init: EventInit,
    ) -> bool {
        !self.dispatch(target, event_type, init).default_prevented()
    }

    /// Full capture/target/bubble dispatch; the path crosses shadow
    /// boundaries up to the document.
    pub(crate) fn dispatch(
        &mut self,
        target: NodeId,
        event_type: &str,
        init: EventInit,
    ) -> EventState {
        let mut event = EventState::new(event_type, target, init);
        if self.record_events {
            let line = self.event_log_line(&event);
            self.push_log(line);
        }

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self
                .dom
                .parent(node)
                .or_else(|| self.dom.host_of(node));
        }

        // Capture phase, outermost ancestor first.
        for node in path[1..].iter().rev() {
            self.invoke_listeners(*node, &mut event, true);
            if event.propagation_stopped() {
                return event;
            }
        }

        // Target phase: capture listeners first, then bubble listeners.
        self.invoke_listeners(target, &mut event, true);
        if event.propagation_stopped() {
            return event;
        }
        self.invoke_listeners(target, &mut event, false);
        if event.propagation_stopped() {
            return event;
        }

        // Bubble phase.
        for node in path[1..].iter() {
            self.invoke_listeners(*node, &mut event, false);
            if event.propagation_stopped() {
                return event;
            }
        }

        event
    }

    fn invoke_listeners(&mut self, node: NodeId, event: &mut EventState, capture: bool) {
        let listeners = self.listeners.get(node, &event.event_type, capture);
        event.current_target = node;
        for listener in listeners {
            // A listener whose body re-enters dispatch can reach itself
            // again; the inner dispatch skips it instead of re-running it.
            if let Ok(mut callback) = listener.try_borrow_mut() {
                callback(self, event);
            }
            if event.propagation_stopped() {
                break;
            }
        }
    }

    // ----- focus -----

    pub fn focus(&mut self, selector: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        self.scoped(|h| h.focus_node(node))
    }

    pub fn blur(&mut self, selector: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        self.scoped(|h| h.blur_node(node))
    }

    pub fn is_focused(&self, selector: &str) -> Result<bool> {
        let node = self.select_one(selector)?;
        Ok(self.resolve_active() == Some(node))
    }

    pub(crate) fn focus_node(&mut self, node: NodeId) {
        if !self.is_focusable(node) {
            return;
        }
        if self.resolve_active() == Some(node) {
            return;
        }
        if let Some(current) = self.focused {
            self.blur_node(current);
        }
        self.focused = Some(node);
        self.dispatch(node, "focusin", EventInit::default());
        self.dispatch(node, "focus", EventInit::default());
    }

    pub(crate) fn blur_node(&mut self, node: NodeId) {
        if self.focused != Some(node) {
            return;
        }
        self.dispatch(node, "focusout", EventInit::default());
        self.dispatch(node, "blur", EventInit::default());
        self.focused = None;
    }

    /// The document's active element: the focused node, seen from outside
    /// any shadow tree it lives in.
    fn document_active_element(&self) -> Option<NodeId> {
        let mut element = self.focused?;
        loop {
            let root = self.dom.tree_root(element);
            match self.dom.host_of(root) {
                Some(host) => element = host,
                None => return Some(element),
            }
        }
    }

    /// Live focus resolution: starts at the document's active element and
    /// recurses into shadow hosts until a non-host element is found. Never
    /// cached; call it before every action.
    pub(crate) fn resolve_active(&self) -> Option<NodeId> {
        let mut element = self.document_active_element()?;
        while let Some(root) = self.dom.shadow_root(element) {
            match self.shadow_active_element(root) {
                Some(inner) => element = inner,
                None => break,
            }
        }
        Some(element)
    }

    fn shadow_active_element(&self, shadow_root: NodeId) -> Option<NodeId> {
        // The focused node as seen from this shadow root: either directly in
        // its tree, or the nested host the focus sits behind.
        let mut element = self.focused?;
        loop {
            let root = self.dom.tree_root(element);
            if root == shadow_root {
                return Some(element);
            }
            element = self.dom.host_of(root)?;
        }
    }

    pub(crate) fn current_target(&self) -> NodeId {
        self.resolve_active().unwrap_or(self.dom.root)
    }

    // ----- values and selection -----

    /// The editable text of a node: text content for contenteditable
    /// containers, the scalar value for form controls, `None` otherwise.
    pub(crate) fn value_of_node(&self, node: NodeId) -> Option<String> {
        if self.dom.is_contenteditable(node) {
            return Some(self.dom.text_content(node));
        }
        self.dom.value(node)
    }

    pub(crate) fn selection_of_node(&self, node: NodeId) -> Option<(usize, usize)> {
        if self.dom.is_contenteditable(node) {
            return self.doc_selection.map(|range| (range.start, range.end));
        }
        self.dom.selection(node)
    }

    pub(crate) fn set_selection_raw(&mut self, node: NodeId, start: usize, end: usize) {
        if self.dom.is_contenteditable(node) {
            let len = char_len(&self.dom.text_content(node));
            self.doc_selection = Some(DocRange {
                node,
                start: start.min(len),
                end: end.min(len),
            });
            return;
        }
        if self.dom.supports_selection(node) {
            self.dom.set_selection(node, start, end);
        }
    }

    /// Applies a selection only when the control exposes one and it differs
    /// from what is already there.
    pub(crate) fn set_selection_if_necessary(&mut self, node: NodeId, start: usize, end: usize) {
        let current = self.selection_of_node(node);
        if !self.dom.is_contenteditable(node) && current.is_none() {
            // cannot set selection
            return;
        }
        if current != Some((start, end)) {
            self.set_selection_raw(node, start, end);
        }
    }

    /// Writes the value, then dispatches `input`; a listener observes the
    /// new value already applied, as in a live DOM.
    pub(crate) fn fire_input_with_value(&mut self, node: NodeId, new_value: &str, init: EventInit) {
        self.write_value(node, new_value);
        self.dispatch(node, "input", init);
    }

    pub(crate) fn fire_change_with_value(&mut self, node: NodeId, new_value: &str) {
        self.write_value(node, new_value);
        self.dispatch(node, "change", EventInit::default());
    }

    fn write_value(&mut self, node: NodeId, new_value: &str) {
        if self.dom.is_contenteditable(node) {
            self.dom.set_text_content(node, new_value);
            let len = char_len(new_value);
            if let Some(range) = &mut self.doc_selection {
                if range.node == node {
                    range.start = range.start.min(len);
                    range.end = range.end.min(len);
                }
            }
        } else {
            self.dom.set_value(node, new_value);
        }
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let node = self.select_one(selector)?;
        self.value_of_node(node)
            .ok_or_else(|| Error::InvalidValueType {
                selector: selector.to_string(),
                tag: self.dom.tag_name(node).unwrap_or("#document").to_string(),
            })
    }

    /// Test-setup value write; sanitized like any programmatic write, with
    /// no events fired.
    pub fn set_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        if !self.dom.is_contenteditable(node) && !self.dom.has_scalar_value(node) {
            return Err(Error::InvalidValueType {
                selector: selector.to_string(),
                tag: self.dom.tag_name(node).unwrap_or("#document").to_string(),
            });
        }
        self.write_value(node, value);
        Ok(())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let node = self.select_one(selector)?;
        Ok(self.dom.text_content(node))
    }

    pub fn selection_range(&self, selector: &str) -> Result<Option<(usize, usize)>> {
        let node = self.select_one(selector)?;
        Ok(self.selection_of_node(node))
    }

    pub fn set_selection_range(&mut self, selector: &str, start: usize, end: usize) -> Result<()> {
        let node = self.select_one(selector)?;
        self.set_selection_raw(node, start, end);
        Ok(())
    }

    pub fn set_attr(&mut self, selector: &str, name: &str, value: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        self.dom.set_attr(node, name, value);
        Ok(())
    }

    pub fn remove_attr(&mut self, selector: &str, name: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        self.dom.remove_attr(node, name);
        Ok(())
    }

    pub fn set_disabled(&mut self, selector: &str, disabled: bool) -> Result<()> {
        if disabled {
            self.set_attr(selector, "disabled", "")
        } else {
            self.remove_attr(selector, "disabled")
        }
    }

    pub fn is_checked(&self, selector: &str) -> Result<bool> {
        let node = self.select_one(selector)?;
        Ok(self.dom.checked(node))
    }

    // ----- virtual clock -----

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    /// Schedules `callback` to run once the clock reaches `delay_ms` from
    /// now. Tasks run during `advance_time` and at the end of `scoped`.
    pub fn set_timeout(
        &mut self,
        delay_ms: i64,
        callback: impl FnMut(&mut Harness) + 'static,
    ) -> i64 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        self.tasks.push(ScheduledTask {
            id,
            due_at: self.now_ms + delay_ms.max(0),
            order,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    /// Cancels a pending task; returns whether it was still scheduled.
    pub fn clear_timeout(&mut self, id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        self.now_ms = self.now_ms.saturating_add(delta_ms.max(0));
        self.run_due_tasks()
    }

    /// Runs `f`, then drains every task already due. This is the hook point
    /// for host frameworks that batch updates behind a scheduled flush.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> Result<T> {
        let out = f(self);
        self.run_due_tasks()?;
        Ok(out)
    }

    fn run_due_tasks(&mut self) -> Result<()> {
        let mut steps = 0usize;
        loop {
            let next = self
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, task)| task.due_at <= self.now_ms)
                .min_by_key(|(_, task)| (task.due_at, task.order))
                .map(|(idx, _)| idx);
            let Some(idx) = next else {
                return Ok(());
            };
            steps += 1;
            if steps > TASK_STEP_LIMIT {
                return Err(Error::TaskLimitExceeded(TASK_STEP_LIMIT));
            }
            let task = self.tasks.remove(idx);
            (&mut *task.callback.borrow_mut())(self);
        }
    }

    // ----- event trace -----

    /// When enabled, every dispatched event appends one line to the log,
    /// e.g. `keydown #name key=a shiftKey`.
    pub fn record_events(&mut self, enabled: bool) {
        self.record_events = enabled;
    }

    pub fn take_event_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.event_log).into_iter().collect()
    }

    fn push_log(&mut self, line: String) {
        if self.event_log.len() >= EVENT_LOG_LIMIT {
            self.event_log.pop_front();
        }
        self.event_log.push_back(line);
    }

    fn event_log_line(&self, event: &EventState) -> String {
        let mut line = format!("{} {}", event.event_type, self.node_label(event.target));
        if let Some(key) = &event.init.key {
            line.push_str(&format!(" key={key}"));
        }
        if event.init.shift_key {
            line.push_str(" shiftKey");
        }
        if event.init.ctrl_key {
            line.push_str(" ctrlKey");
        }
        if event.init.alt_key {
            line.push_str(" altKey");
        }
        if event.init.meta_key {
            line.push_str(" metaKey");
        }
        if let Some(input_type) = &event.init.input_type {
            line.push_str(&format!(" inputType={input_type}"));
        }
        line
    }

    pub(crate) fn node_label(&self, node: NodeId) -> String {
        match &self.dom.nodes[node.0].node_type {
            NodeType::Document => "#document".to_string(),
            NodeType::ShadowRoot => "#shadow-root".to_string(),
            NodeType::Text(_) => "#text".to_string(),
            NodeType::Element(element) => element
                .attrs
                .get("id")
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| element.tag_name.clone()),
        }
    }

    // ----- assertions -----

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let actual = self.value(selector)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let actual = self.text(selector)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    pub fn assert_selection(&self, selector: &str, start: usize, end: usize) -> Result<()> {
        let actual = self.selection_range(selector)?;
        if actual != Some((start, end)) {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("selection {start}..{end}"),
                actual: format!("{actual:?}"),
            });
        }
        Ok(())
    }
}
