//! Synthetic event payloads, listener registration and dispatch state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::harness::Harness;

/// Payload carried by a synthetic event. Key fields for keyboard events,
/// mouse fields for pointer events, input metadata for `input` events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventInit {
    pub key: Option<String>,
    pub key_code: Option<u32>,
    pub char_code: Option<u32>,
    pub shift_key: bool,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    pub input_type: Option<String>,
    pub data: Option<String>,
    pub detail: u32,
    pub button: u16,
    pub buttons: u16,
}

impl EventInit {
    pub(crate) fn for_key(key: &str, key_code: u32) -> Self {
        Self {
            key: Some(key.to_string()),
            key_code: Some(key_code),
            ..Self::default()
        }
    }

    pub(crate) fn with_char_code(mut self, char_code: u32) -> Self {
        self.char_code = Some(char_code);
        self
    }
}

/// Modifier keys currently held; merged onto every subsequent event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ModifierFlags {
    pub(crate) shift: bool,
    pub(crate) ctrl: bool,
    pub(crate) alt: bool,
    pub(crate) meta: bool,
}

impl ModifierFlags {
    pub(crate) fn apply(&self, init: &mut EventInit) {
        init.shift_key |= self.shift;
        init.ctrl_key |= self.ctrl;
        init.alt_key |= self.alt;
        init.meta_key |= self.meta;
    }
}

/// Mutable state of one dispatch, shared with every listener on the path.
#[derive(Debug, Clone)]
pub struct EventState {
    pub event_type: String,
    pub target: NodeId,
    pub current_target: NodeId,
    pub init: EventInit,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl EventState {
    pub(crate) fn new(event_type: &str, target: NodeId, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            init,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub(crate) fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub(crate) type Listener = Rc<RefCell<dyn FnMut(&mut Harness, &mut EventState)>>;

struct StoredListener {
    callback: Listener,
    capture: bool,
}

#[derive(Default)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<StoredListener>>>,
}

impl ListenerStore {
    pub(crate) fn add(&mut self, node_id: NodeId, event: &str, callback: Listener, capture: bool) {
        self.map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(StoredListener { callback, capture });
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|l| l.capture == capture)
                    .map(|l| l.callback.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_mouse_press_event(event: &str) -> bool {
    matches!(event, "mousedown" | "mouseup" | "click" | "dblclick")
}

/// Mouse payload with `detail`/`button`/`buttons` filled in the way a real
/// primary-button interaction reports them.
pub(crate) fn mouse_init(event: &str, click_count: u32) -> EventInit {
    let detail = if matches!(event, "mousedown" | "mouseup" | "click") {
        1 + click_count
    } else {
        click_count
    };
    let buttons = if is_mouse_press_event(event) { 1 } else { 0 };
    EventInit {
        detail,
        button: 0,
        buttons,
        ..EventInit::default()
    }
}
