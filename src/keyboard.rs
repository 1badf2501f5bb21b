//! The keyboard-input simulation engine: directive tokenizing, per-token
//! event sequences, and the typing state threaded between keystrokes.
//!
//! A directive string is consumed left to right. At every position the
//! longest applicable token wins: a modifier open/close tag (`{shift}`,
//! `{/shift}`), then a special-key tag (`{enter}`, `{backspace}`, ...),
//! then a single literal character.

use crate::dom::NodeId;
use crate::edit::{self, Edit, EditSnapshot, char_len};
use crate::events::{EventInit, ModifierFlags};
use crate::harness::{DocRange, Harness};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

impl Modifier {
    pub(crate) const ALL: [Modifier; 4] = [Self::Shift, Self::Ctrl, Self::Alt, Self::Meta];

    fn name(self) -> &'static str {
        match self {
            Self::Shift => "shift",
            Self::Ctrl => "ctrl",
            Self::Alt => "alt",
            Self::Meta => "meta",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Shift => "Shift",
            Self::Ctrl => "Control",
            Self::Alt => "Alt",
            Self::Meta => "Meta",
        }
    }

    fn key_code(self) -> u32 {
        match self {
            Self::Shift => 16,
            Self::Ctrl => 17,
            Self::Alt => 18,
            Self::Meta => 93,
        }
    }

    fn open_token(self) -> String {
        format!("{{{}}}", self.name())
    }

    fn close_token(self) -> String {
        format!("{{/{}}}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpecialKey {
    ArrowLeft,
    ArrowRight,
    Enter,
    Esc,
    Del,
    Backspace,
    SelectAll,
    Space,
}

impl SpecialKey {
    pub(crate) const ALL: [SpecialKey; 8] = [
        Self::ArrowLeft,
        Self::ArrowRight,
        Self::Enter,
        Self::Esc,
        Self::Del,
        Self::Backspace,
        Self::SelectAll,
        Self::Space,
    ];

    fn token_name(self) -> &'static str {
        match self {
            Self::ArrowLeft => "{arrowleft}",
            Self::ArrowRight => "{arrowright}",
            Self::Enter => "{enter}",
            Self::Esc => "{esc}",
            Self::Del => "{del}",
            Self::Backspace => "{backspace}",
            Self::SelectAll => "{selectall}",
            Self::Space => "{space}",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Char(char),
    Special(SpecialKey),
    ModifierOpen(Modifier),
    ModifierClose(Modifier),
}

/// Tokenizes a whole directive string. An opened modifier whose close tag
/// never appears has it appended to the remainder, so every hold is released
/// by the end of the directive unless auto-closing is disabled.
pub(crate) fn parse_directive(text: &str, skip_auto_close: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut remaining = text.to_string();

    'outer: while !remaining.is_empty() {
        for modifier in Modifier::ALL {
            let close = modifier.close_token();
            if remaining.starts_with(&close) {
                tokens.push(Token::ModifierClose(modifier));
                remaining.replace_range(..close.len(), "");
                continue 'outer;
            }
            let open = modifier.open_token();
            if remaining.starts_with(&open) {
                if !skip_auto_close && !remaining.contains(&close) {
                    remaining.push_str(&close);
                }
                tokens.push(Token::ModifierOpen(modifier));
                remaining.replace_range(..open.len(), "");
                continue 'outer;
            }
        }
        for special in SpecialKey::ALL {
            let name = special.token_name();
            if remaining.starts_with(name) {
                tokens.push(Token::Special(special));
                remaining.replace_range(..name.len(), "");
                continue 'outer;
            }
        }
        let Some(ch) = remaining.chars().next() else {
            break;
        };
        if ch == ' ' {
            tokens.push(Token::Special(SpecialKey::Space));
        } else {
            tokens.push(Token::Char(ch));
        }
        remaining.replace_range(..ch.len_utf8(), "");
    }
    tokens
}

#[derive(Debug, Clone)]
pub struct TypeOptions {
    /// Virtual-clock milliseconds between actions; tasks already due run at
    /// each step. Zero means a fully synchronous run.
    pub delay_ms: i64,
    /// Skip the initial click that would establish focus.
    pub skip_click: bool,
    /// Leave opened modifiers held at the end of the directive.
    pub skip_auto_close: bool,
    /// Where typing starts when the control's selection is still the
    /// untouched `(0, 0)`; defaults to the end of the current value.
    pub initial_selection_start: Option<usize>,
    pub initial_selection_end: Option<usize>,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            skip_click: false,
            skip_auto_close: false,
            initial_selection_start: None,
            initial_selection_end: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasteOptions {
    pub initial_selection_start: Option<usize>,
    pub initial_selection_end: Option<usize>,
}

/// Mutable state threaded through one typing run. The carry flags survive
/// only across consecutive literal characters; every other action resets
/// them.
#[derive(Debug, Clone, Default)]
struct TypingContext {
    modifiers: ModifierFlags,
    prev_was_minus: bool,
    prev_was_period: bool,
    prev_value: String,
    typed_value: String,
}

impl TypingContext {
    fn key_init(&self, key: &str, key_code: u32) -> EventInit {
        let mut init = EventInit::for_key(key, key_code);
        self.modifiers.apply(&mut init);
        init
    }

    fn reset_carries(&mut self) {
        self.prev_was_minus = false;
        self.prev_was_period = false;
        self.prev_value.clear();
        self.typed_value.clear();
    }
}

fn set_flag(flags: &mut ModifierFlags, modifier: Modifier, on: bool) {
    match modifier {
        Modifier::Shift => flags.shift = on,
        Modifier::Ctrl => flags.ctrl = on,
        Modifier::Alt => flags.alt = on,
        Modifier::Meta => flags.meta = on,
    }
}

impl Harness {
    /// Types `text` into the element at `selector` the way a user would:
    /// click to focus, then one full event sequence per keystroke.
    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        self.type_text_with(selector, text, &TypeOptions::default())
    }

    pub fn type_text_with(
        &mut self,
        selector: &str,
        text: &str,
        options: &TypeOptions,
    ) -> Result<()> {
        let target = self.select_one(selector)?;
        self.type_into(target, text, options)
    }

    /// Selects all content of a text control and deletes it. Errors on
    /// elements that cannot hold editable text; silently does nothing on a
    /// disabled control.
    pub fn clear(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let tag = self
            .dom
            .tag_name(target)
            .unwrap_or("#document")
            .to_string();
        if tag != "input" && tag != "textarea" {
            return Err(Error::UnsupportedElement {
                selector: selector.to_string(),
                tag,
            });
        }
        if self.dom.disabled(target) {
            return Ok(());
        }

        // Selection ranges are not scriptable on e.g. number inputs; flip
        // the type to text for the duration of the run.
        let saved_kind = self.dom.attr(target, "type");
        if tag == "input" {
            self.dom.set_attr(target, "type", "text");
        }
        let (start, end) = self.dom.selection(target).unwrap_or((0, 0));
        let options = TypeOptions {
            initial_selection_start: Some(start),
            initial_selection_end: Some(end),
            ..TypeOptions::default()
        };
        let result = self.type_into(target, "{selectall}{del}", &options);
        if tag == "input" {
            match saved_kind {
                Some(kind) => self.dom.set_attr(target, "type", &kind),
                None => self.dom.remove_attr(target, "type"),
            }
        }
        result
    }

    pub fn paste(&mut self, selector: &str, text: &str) -> Result<()> {
        self.paste_with(selector, text, &PasteOptions::default())
    }

    pub fn paste_with(
        &mut self,
        selector: &str,
        text: &str,
        options: &PasteOptions,
    ) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.dom.disabled(target) {
            return Ok(());
        }
        if !self.dom.has_scalar_value(target) {
            return Err(Error::InvalidValueType {
                selector: selector.to_string(),
                tag: self.dom.tag_name(target).unwrap_or("#document").to_string(),
            });
        }
        self.scoped(|h| h.focus_node(target))?;

        if self.dom.selection(target) == Some((0, 0)) {
            let len = char_len(&self.dom.value(target).unwrap_or_default());
            self.set_selection_if_necessary(
                target,
                options.initial_selection_start.unwrap_or(len),
                options.initial_selection_end.unwrap_or(len),
            );
        }

        self.dispatch(target, "paste", EventInit::default());

        if !self.dom.readonly(target) {
            let edit = edit::insertion(&self.edit_snapshot(target), text);
            let init = EventInit {
                input_type: Some("insertFromPaste".to_string()),
                ..EventInit::default()
            };
            self.fire_input_with_value(target, &edit.value, init);
            self.set_selection_if_necessary(target, edit.caret, edit.caret);
        }
        Ok(())
    }

    pub(crate) fn type_into(
        &mut self,
        target: NodeId,
        text: &str,
        options: &TypeOptions,
    ) -> Result<()> {
        if self.dom.disabled(target) {
            return Ok(());
        }
        if !options.skip_click {
            self.click_node(target)?;
        }

        if self.dom.is_contenteditable(target) && self.doc_selection.is_none() {
            self.doc_selection = Some(DocRange {
                node: target,
                start: 0,
                end: 0,
            });
        }

        // A fresh control carries the default (0, 0) selection, but typing
        // is expected to continue at the end of the current value unless the
        // caller placed the caret explicitly.
        let current = self.current_target();
        if let Some(value) = self.value_of_node(current) {
            if self.selection_of_node(target) == Some((0, 0)) {
                let len = char_len(&value);
                let current = self.current_target();
                self.set_selection_if_necessary(
                    current,
                    options.initial_selection_start.unwrap_or(len),
                    options.initial_selection_end.unwrap_or(len),
                );
            }
        }

        let tokens = parse_directive(text, options.skip_auto_close);
        let mut ctx = TypingContext::default();
        for token in &tokens {
            if options.delay_ms > 0 {
                self.advance_time(options.delay_ms)?;
            }
            // The focus target is resolved fresh for every action; a
            // disabled target skips the action but the run continues.
            if self.dom.disabled(self.current_target()) {
                continue;
            }
            self.run_token(token, &mut ctx);
        }
        Ok(())
    }

    fn run_token(&mut self, token: &Token, ctx: &mut TypingContext) {
        match token {
            Token::Char(ch) => self.type_character(*ch, ctx),
            Token::Special(special) => {
                match special {
                    SpecialKey::ArrowLeft => self.navigation_key("ArrowLeft", 37, -1, ctx),
                    SpecialKey::ArrowRight => self.navigation_key("ArrowRight", 39, 1, ctx),
                    SpecialKey::Enter => self.handle_enter(ctx),
                    SpecialKey::Esc => self.handle_escape(ctx),
                    SpecialKey::Del => self.handle_delete(ctx),
                    SpecialKey::Backspace => self.handle_backspace(ctx),
                    SpecialKey::SelectAll => self.handle_select_all(),
                    SpecialKey::Space => self.handle_space(ctx),
                }
                ctx.reset_carries();
            }
            Token::ModifierOpen(modifier) => {
                set_flag(&mut ctx.modifiers, *modifier, true);
                let init = ctx.key_init(modifier.key(), modifier.key_code());
                let current = self.current_target();
                self.dispatch(current, "keydown", init);
                ctx.reset_carries();
            }
            Token::ModifierClose(modifier) => {
                set_flag(&mut ctx.modifiers, *modifier, false);
                let init = ctx.key_init(modifier.key(), modifier.key_code());
                let current = self.current_target();
                self.dispatch(current, "keyup", init);
                ctx.reset_carries();
            }
        }
    }

    fn type_character(&mut self, ch: char, ctx: &mut TypingContext) {
        let key = ch.to_string();
        let key_code = ch as u32;
        let text_to_be_typed = format!("{}{}", ctx.typed_value, ch);
        let mut next_minus = false;
        let mut next_period = false;
        let mut prev_value = ctx.prev_value.clone();

        let current = self.current_target();
        let down_ok = self.fire_cancellable(current, "keydown", ctx.key_init(&key, key_code));

        if down_ok {
            let current = self.current_target();
            let press_init = ctx.key_init(&key, key_code).with_char_code(key_code);
            let press_ok = self.fire_cancellable(current, "keypress", press_init);

            let current = self.current_target();
            if press_ok && self.value_of_node(current).is_some() {
                let mut new_entry = key.clone();
                if ctx.prev_was_minus {
                    new_entry = format!("-{ch}");
                } else if ctx.prev_was_period {
                    new_entry = format!("{prev_value}.{ch}");
                }
                // Once the accumulated keystrokes form a complete date, the
                // whole string goes in at once.
                if self.is_valid_date_input(current, &text_to_be_typed) {
                    new_entry = text_to_be_typed.clone();
                }

                let edit = edit::insertion(&self.edit_snapshot(current), &new_entry);
                let mut input_init = EventInit {
                    data: Some(key.clone()),
                    input_type: Some("insertText".to_string()),
                    ..EventInit::default()
                };
                ctx.modifiers.apply(&mut input_init);
                prev_value = self.fire_input_if_needed(&edit, input_init);

                let current = self.current_target();
                if self.is_valid_date_input(current, &text_to_be_typed) {
                    self.fire_change_with_value(current, &text_to_be_typed);
                }

                // A '-' or '.' that left a number input unchanged carries
                // over so the next digit merges with it; an invalid
                // character in between preserves the pending carry.
                let current = self.current_target();
                if self.dom.input_kind(current).as_deref() == Some("number") {
                    let new_value = self.value_of_node(current).unwrap_or_default();
                    if new_value == prev_value && new_entry != "-" {
                        next_minus = ctx.prev_was_minus;
                    } else {
                        next_minus = new_entry == "-";
                    }
                    if new_value == prev_value && new_entry != "." {
                        next_period = ctx.prev_was_period;
                    } else {
                        next_period = new_entry == ".";
                    }
                }
            }
        }

        let current = self.current_target();
        let up_init = ctx.key_init(&key, key_code);
        self.dispatch(current, "keyup", up_init);

        ctx.prev_was_minus = next_minus;
        ctx.prev_was_period = next_period;
        ctx.prev_value = prev_value;
        ctx.typed_value = text_to_be_typed;
    }

    fn handle_enter(&mut self, ctx: &TypingContext) {
        let key = "Enter";
        let key_code = 13;

        let current = self.current_target();
        let down_ok = self.fire_cancellable(current, "keydown", ctx.key_init(key, key_code));

        if down_ok {
            let current = self.current_target();
            let press_init = ctx.key_init(key, key_code).with_char_code(key_code);
            let press_ok = self.fire_cancellable(current, "keypress", press_init);

            if press_ok {
                let current = self.current_target();
                if self.dom.is_clickable(current) {
                    let mut init = EventInit::default();
                    ctx.modifiers.apply(&mut init);
                    self.fire_click_default(current, init);
                }

                let current = self.current_target();
                if self.dom.has_tag(current, "textarea") {
                    let edit = edit::insertion(&self.edit_snapshot(current), "\n");
                    let mut init = EventInit {
                        input_type: Some("insertLineBreak".to_string()),
                        ..EventInit::default()
                    };
                    ctx.modifiers.apply(&mut init);
                    self.fire_input_with_value(current, &edit.value, init);
                    self.correct_selection(&edit);
                }

                let current = self.current_target();
                if self.dom.has_tag(current, "input") {
                    if let Some(form) = self.dom.find_ancestor_by_tag(current, "form") {
                        if self.form_submits_on_enter(form) {
                            self.dispatch(form, "submit", EventInit::default());
                        }
                    }
                }
            }
        }

        let current = self.current_target();
        self.dispatch(current, "keyup", ctx.key_init(key, key_code));
    }

    /// Enter inside an input submits its form only when the form has exactly
    /// one input, or an explicit submit control.
    fn form_submits_on_enter(&self, form: NodeId) -> bool {
        let inputs = self.dom.descendants_by_tag(form, "input");
        if inputs.len() == 1 {
            return true;
        }
        if inputs
            .iter()
            .any(|node| self.dom.attr(*node, "type").as_deref() == Some("submit"))
        {
            return true;
        }
        self.dom
            .descendants_by_tag(form, "button")
            .iter()
            .any(|node| self.dom.attr(*node, "type").as_deref() == Some("submit"))
    }

    fn handle_escape(&mut self, ctx: &TypingContext) {
        // Browsers do not fire a keypress for Escape.
        let current = self.current_target();
        self.dispatch(current, "keydown", ctx.key_init("Escape", 27));
        let current = self.current_target();
        self.dispatch(current, "keyup", ctx.key_init("Escape", 27));
    }

    fn handle_delete(&mut self, ctx: &TypingContext) {
        let key = "Delete";
        let key_code = 46;

        let current = self.current_target();
        let down_ok = self.fire_cancellable(current, "keydown", ctx.key_init(key, key_code));
        if down_ok {
            let current = self.current_target();
            let edit = edit::forward_delete(&self.edit_snapshot(current));
            let mut init = EventInit {
                input_type: Some("deleteContentForward".to_string()),
                ..EventInit::default()
            };
            ctx.modifiers.apply(&mut init);
            self.fire_input_if_needed(&edit, init);
        }
        let current = self.current_target();
        self.dispatch(current, "keyup", ctx.key_init(key, key_code));
    }

    fn handle_backspace(&mut self, ctx: &TypingContext) {
        let key = "Backspace";
        let key_code = 8;

        let current = self.current_target();
        let down_ok = self.fire_cancellable(current, "keydown", ctx.key_init(key, key_code));
        if down_ok {
            let current = self.current_target();
            let edit = edit::backspace(&self.edit_snapshot(current));
            let mut init = EventInit {
                input_type: Some("deleteContentBackward".to_string()),
                ..EventInit::default()
            };
            ctx.modifiers.apply(&mut init);
            self.fire_input_if_needed(&edit, init);
        }
        let current = self.current_target();
        self.dispatch(current, "keyup", ctx.key_init(key, key_code));
    }

    fn handle_select_all(&mut self) {
        let current = self.current_target();
        if let Some(value) = self.value_of_node(current) {
            self.set_selection_raw(current, 0, char_len(&value));
        }
    }

    fn handle_space(&mut self, ctx: &mut TypingContext) {
        let current = self.current_target();
        if self.dom.is_clickable(current) {
            self.space_on_clickable(ctx);
            return;
        }
        self.type_character(' ', ctx);
    }

    fn space_on_clickable(&mut self, ctx: &TypingContext) {
        let key = " ";
        let key_code = 32;

        let current = self.current_target();
        let down_ok = self.fire_cancellable(current, "keydown", ctx.key_init(key, key_code));
        if down_ok {
            let current = self.current_target();
            let press_init = ctx.key_init(key, key_code).with_char_code(key_code);
            self.dispatch(current, "keypress", press_init);
        }

        let current = self.current_target();
        let up_ok = self.fire_cancellable(current, "keyup", ctx.key_init(key, key_code));

        if down_ok && up_ok {
            let current = self.current_target();
            let mut init = EventInit::default();
            ctx.modifiers.apply(&mut init);
            self.fire_click_default(current, init);
        }
    }

    fn navigation_key(&mut self, key: &str, key_code: u32, delta: i64, ctx: &TypingContext) {
        let current = self.current_target();
        self.dispatch(current, "keydown", ctx.key_init(key, key_code));

        let current = self.current_target();
        if let Some((start, end)) = self.selection_of_node(current) {
            let step = |offset: usize| {
                if delta < 0 {
                    offset.saturating_sub(1)
                } else {
                    offset + 1
                }
            };
            self.set_selection_if_necessary(current, step(start), step(end));
        }

        let current = self.current_target();
        self.dispatch(current, "keyup", ctx.key_init(key, key_code));
    }

    // ----- shared edit plumbing -----

    fn edit_snapshot(&self, node: NodeId) -> EditSnapshot {
        EditSnapshot {
            value: self.value_of_node(node).unwrap_or_default(),
            selection: self.selection_of_node(node),
            reject_invalid_date: self.dom.input_kind(node).as_deref() == Some("date"),
            max_length: self.dom.max_length(node),
        }
    }

    fn is_valid_date_input(&self, node: NodeId, value: &str) -> bool {
        self.dom.input_kind(node).as_deref() == Some("date") && edit::is_valid_date_string(value)
    }

    /// Fires `input` only when the computed value differs from what is on
    /// the control, then reconciles the selection. Returns the value that
    /// was on the control beforehand.
    fn fire_input_if_needed(&mut self, edit: &Edit, init: EventInit) -> String {
        let current = self.current_target();
        let prev_value = self.value_of_node(current).unwrap_or_default();
        if !self.dom.readonly(current) && !self.dom.is_clickable(current) && edit.value != prev_value
        {
            self.fire_input_with_value(current, &edit.value, init);
            self.correct_selection(edit);
        }
        prev_value
    }

    /// After an input event the caret lands on the computed offset, unless
    /// a handler replaced the value, in which case it is forced to the end
    /// of whatever value now exists.
    fn correct_selection(&mut self, edit: &Edit) {
        let current = self.current_target();
        let value = self.value_of_node(current).unwrap_or_default();
        if value == edit.value {
            self.set_selection_if_necessary(current, edit.caret, edit.caret);
        } else {
            let len = char_len(&value);
            self.set_selection_if_necessary(current, len, len);
        }
    }
}
