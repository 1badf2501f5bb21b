use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::edit::{self, EditSnapshot};
use super::keyboard::{Modifier, SpecialKey, Token, parse_directive};
use super::*;

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let count = Rc::new(Cell::new(0));
    (count.clone(), count)
}

// ----- directive tokenizing -----

#[test]
fn tokenizes_literals_specials_and_spaces() {
    let tokens = parse_directive("ab{enter} c", false);
    assert_eq!(
        tokens,
        vec![
            Token::Char('a'),
            Token::Char('b'),
            Token::Special(SpecialKey::Enter),
            Token::Special(SpecialKey::Space),
            Token::Char('c'),
        ]
    );
}

#[test]
fn auto_closes_an_open_modifier() {
    let tokens = parse_directive("{shift}a", false);
    assert_eq!(
        tokens,
        vec![
            Token::ModifierOpen(Modifier::Shift),
            Token::Char('a'),
            Token::ModifierClose(Modifier::Shift),
        ]
    );
}

#[test]
fn skip_auto_close_leaves_modifier_open() {
    let tokens = parse_directive("{shift}a", true);
    assert_eq!(
        tokens,
        vec![Token::ModifierOpen(Modifier::Shift), Token::Char('a')]
    );
}

#[test]
fn explicit_close_is_not_doubled() {
    let tokens = parse_directive("{ctrl}a{/ctrl}", false);
    assert_eq!(
        tokens,
        vec![
            Token::ModifierOpen(Modifier::Ctrl),
            Token::Char('a'),
            Token::ModifierClose(Modifier::Ctrl),
        ]
    );
}

#[test]
fn unknown_brace_tag_is_literal_text() {
    let tokens = parse_directive("{foo}", false);
    assert_eq!(
        tokens,
        vec![
            Token::Char('{'),
            Token::Char('f'),
            Token::Char('o'),
            Token::Char('o'),
            Token::Char('}'),
        ]
    );
}

#[test]
fn close_without_open_still_tokenizes() {
    let tokens = parse_directive("{/shift}a", false);
    assert_eq!(
        tokens,
        vec![Token::ModifierClose(Modifier::Shift), Token::Char('a')]
    );
}

// ----- edit model -----

fn snap(value: &str, selection: Option<(usize, usize)>) -> EditSnapshot {
    EditSnapshot {
        value: value.to_string(),
        selection,
        reject_invalid_date: false,
        max_length: None,
    }
}

#[test]
fn insertion_at_collapsed_caret() {
    let edit = edit::insertion(&snap("abcd", Some((2, 2))), "X");
    assert_eq!(edit.value, "abXcd");
    assert_eq!(edit.caret, 3);
}

#[test]
fn insertion_replaces_selected_range() {
    let edit = edit::insertion(&snap("abcd", Some((1, 3))), "XY");
    assert_eq!(edit.value, "aXYd");
    assert_eq!(edit.caret, 3);
}

#[test]
fn insertion_without_selection_appends() {
    let edit = edit::insertion(&snap("12", None), "3");
    assert_eq!(edit.value, "123");
    assert_eq!(edit.caret, 3);
}

#[test]
fn insertion_honors_max_length() {
    let mut snapshot = snap("abc", Some((3, 3)));
    snapshot.max_length = Some(4);
    let edit = edit::insertion(&snapshot, "de");
    assert_eq!(edit.value, "abcd");
    assert_eq!(edit.caret, 4);
}

#[test]
fn backspace_collapsed_and_range() {
    let edit = edit::backspace(&snap("abcd", Some((2, 2))));
    assert_eq!(edit.value, "acd");
    assert_eq!(edit.caret, 1);

    let edit = edit::backspace(&snap("abcd", Some((1, 3))));
    assert_eq!(edit.value, "ad");
    assert_eq!(edit.caret, 1);

    let edit = edit::backspace(&snap("abcd", Some((0, 0))));
    assert_eq!(edit.value, "abcd");
    assert_eq!(edit.caret, 0);
}

#[test]
fn forward_delete_collapsed_and_at_end() {
    let edit = edit::forward_delete(&snap("abcd", Some((1, 1))));
    assert_eq!(edit.value, "acd");
    assert_eq!(edit.caret, 1);

    let edit = edit::forward_delete(&snap("abcd", Some((4, 4))));
    assert_eq!(edit.value, "abcd");
    assert_eq!(edit.caret, 4);
}

#[test]
fn number_string_validation() {
    assert!(edit::is_valid_number_string("-3"));
    assert!(edit::is_valid_number_string(".5"));
    assert!(edit::is_valid_number_string("2.5"));
    assert!(edit::is_valid_number_string("1e3"));
    assert!(!edit::is_valid_number_string("-"));
    assert!(!edit::is_valid_number_string("2."));
    assert!(!edit::is_valid_number_string("a3"));
}

#[test]
fn date_string_validation() {
    assert!(edit::is_valid_date_string("2020-02-29"));
    assert!(edit::is_valid_date_string("2021-12-31"));
    assert!(!edit::is_valid_date_string("2021-02-29"));
    assert!(!edit::is_valid_date_string("2021-13-01"));
    assert!(!edit::is_valid_date_string("2021-1-01"));
    assert!(!edit::is_valid_date_string("2021-05"));
}

// ----- typing into text controls -----

#[test]
fn typing_appends_and_moves_caret() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "abc")?;
    h.assert_value("#name", "abc")?;
    h.assert_selection("#name", 3, 3)?;
    assert!(h.is_focused("#name")?);
    Ok(())
}

#[test]
fn typing_continues_at_end_of_existing_value() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='ab'>")?;
    h.type_text("#name", "cd")?;
    h.assert_value("#name", "abcd")?;
    Ok(())
}

#[test]
fn initial_selection_places_the_caret() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='ab'>")?;
    let options = TypeOptions {
        initial_selection_start: Some(0),
        initial_selection_end: Some(0),
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "cd", &options)?;
    h.assert_value("#name", "cdab")?;
    h.assert_selection("#name", 2, 2)?;
    Ok(())
}

#[test]
fn per_character_event_sequence() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.focus("#name")?;
    h.record_events(true);
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "a", &options)?;
    assert_eq!(
        h.take_event_log(),
        vec![
            "keydown #name key=a",
            "keypress #name key=a",
            "input #name inputType=insertText",
            "keyup #name key=a",
        ]
    );
    Ok(())
}

#[test]
fn canceled_keydown_suppresses_input_but_not_keyup() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    let (keyups, keyups_inner) = counter();
    h.on("#name", "keydown", |_, event| {
        if event.init.key.as_deref() == Some("b") {
            event.prevent_default();
        }
    })?;
    h.on("#name", "keyup", move |_, _| {
        keyups_inner.set(keyups_inner.get() + 1);
    })?;
    h.type_text("#name", "abc")?;
    h.assert_value("#name", "ac")?;
    assert_eq!(keyups.get(), 3);
    Ok(())
}

#[test]
fn canceled_keypress_suppresses_input() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.on("#name", "keypress", |_, event| {
        event.prevent_default();
    })?;
    h.type_text("#name", "ab")?;
    h.assert_value("#name", "")?;
    Ok(())
}

#[test]
fn maxlength_truncates_typed_text() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' maxlength='4'>")?;
    h.type_text("#name", "abcdef")?;
    h.assert_value("#name", "abcd")?;
    h.assert_selection("#name", 4, 4)?;
    Ok(())
}

#[test]
fn readonly_control_gets_keys_but_keeps_its_value() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='keep' readonly>")?;
    let (keydowns, keydowns_inner) = counter();
    let (inputs, inputs_inner) = counter();
    h.on("#name", "keydown", move |_, _| {
        keydowns_inner.set(keydowns_inner.get() + 1);
    })?;
    h.on("#name", "input", move |_, _| {
        inputs_inner.set(inputs_inner.get() + 1);
    })?;
    h.type_text("#name", "ab")?;
    h.assert_value("#name", "keep")?;
    assert_eq!(keydowns.get(), 2);
    assert_eq!(inputs.get(), 0);
    Ok(())
}

#[test]
fn disabled_control_gets_nothing() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' disabled>")?;
    h.record_events(true);
    h.type_text("#name", "ab")?;
    h.assert_value("#name", "")?;
    assert!(h.take_event_log().is_empty());
    Ok(())
}

#[test]
fn disabling_mid_run_skips_remaining_keys() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.on("#name", "input", |h, _| {
        let _ = h.set_disabled("#name", true);
    })?;
    h.type_text("#name", "abc")?;
    h.assert_value("#name", "a")?;
    Ok(())
}

#[test]
fn listener_replacing_the_value_forces_caret_to_end() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.on("#name", "input", |h, _| {
        let _ = h.set_value("#name", "xyz123");
    })?;
    h.type_text("#name", "a")?;
    h.assert_value("#name", "xyz123")?;
    h.assert_selection("#name", 6, 6)?;
    Ok(())
}

#[test]
fn listener_moving_focus_redirects_the_rest_of_the_run() -> Result<()> {
    let mut h = Harness::from_html("<input id='a'><input id='b'>")?;
    h.on("#a", "keydown", |h, _| {
        let _ = h.focus("#b");
    })?;
    h.type_text("#a", "xy")?;
    h.assert_value("#a", "")?;
    h.assert_value("#b", "xy")?;
    Ok(())
}

// ----- number and date inputs -----

#[test]
fn minus_carries_into_the_next_digit() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "-5")?;
    h.assert_value("#n", "-5")?;
    Ok(())
}

#[test]
fn minus_carry_survives_a_rejected_character() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "-a3")?;
    h.assert_value("#n", "-3")?;
    Ok(())
}

#[test]
fn period_carries_with_the_previous_value() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "2.5")?;
    h.assert_value("#n", "2.5")?;
    Ok(())
}

#[test]
fn space_resets_a_pending_carry() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "- 5")?;
    h.assert_value("#n", "5")?;
    Ok(())
}

#[test]
fn lone_minus_leaves_the_value_empty() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "-")?;
    h.assert_value("#n", "")?;
    Ok(())
}

#[test]
fn date_input_commits_once_the_date_is_complete() -> Result<()> {
    let mut h = Harness::from_html("<input id='d' type='date'>")?;
    let (inputs, inputs_inner) = counter();
    let (changes, changes_inner) = counter();
    h.on("#d", "input", move |_, _| {
        inputs_inner.set(inputs_inner.get() + 1);
    })?;
    h.on("#d", "change", move |_, _| {
        changes_inner.set(changes_inner.get() + 1);
    })?;
    h.type_text("#d", "2021-05-15")?;
    h.assert_value("#d", "2021-05-15")?;
    assert_eq!(inputs.get(), 1);
    assert_eq!(changes.get(), 1);
    Ok(())
}

#[test]
fn incomplete_date_is_rejected() -> Result<()> {
    let mut h = Harness::from_html("<input id='d' type='date'>")?;
    h.type_text("#d", "2021-05")?;
    h.assert_value("#d", "")?;
    Ok(())
}

// ----- modifiers -----

#[test]
fn modifier_flags_wrap_the_keystrokes() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.focus("#name")?;
    h.record_events(true);
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "{shift}a", &options)?;
    assert_eq!(
        h.take_event_log(),
        vec![
            "keydown #name key=Shift shiftKey",
            "keydown #name key=a shiftKey",
            "keypress #name key=a shiftKey",
            "input #name shiftKey inputType=insertText",
            "keyup #name key=a shiftKey",
            "keyup #name key=Shift",
        ]
    );
    h.assert_value("#name", "a")?;
    Ok(())
}

#[test]
fn skip_auto_close_keeps_the_modifier_held() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.focus("#name")?;
    h.record_events(true);
    let options = TypeOptions {
        skip_click: true,
        skip_auto_close: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "{ctrl}a", &options)?;
    let log = h.take_event_log();
    assert_eq!(log.last().map(String::as_str), Some("keyup #name key=a ctrlKey"));
    assert!(!log.iter().any(|line| line.starts_with("keyup #name key=Control")));
    Ok(())
}

// ----- special keys -----

#[test]
fn arrows_move_the_caret_before_inserting() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "abc{arrowleft}{arrowleft}X")?;
    h.assert_value("#name", "aXbc")?;
    h.assert_selection("#name", 2, 2)?;
    Ok(())
}

#[test]
fn arrows_are_a_noop_without_a_selection_range() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number'>")?;
    h.type_text("#n", "12{arrowleft}3")?;
    h.assert_value("#n", "123")?;
    Ok(())
}

#[test]
fn selectall_then_typing_replaces_everything() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='abc'>")?;
    h.type_text("#name", "{selectall}x")?;
    h.assert_value("#name", "x")?;
    h.assert_selection("#name", 1, 1)?;
    Ok(())
}

#[test]
fn backspace_removes_before_the_caret() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "abcd{arrowleft}{backspace}")?;
    h.assert_value("#name", "abd")?;
    h.assert_selection("#name", 2, 2)?;
    Ok(())
}

#[test]
fn del_removes_after_the_caret() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "abcd{arrowleft}{arrowleft}{del}")?;
    h.assert_value("#name", "abd")?;
    h.assert_selection("#name", 2, 2)?;
    Ok(())
}

#[test]
fn canceled_keydown_blocks_backspace() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='abc'>")?;
    h.on("#name", "keydown", |_, event| {
        event.prevent_default();
    })?;
    h.type_text("#name", "{backspace}")?;
    h.assert_value("#name", "abc")?;
    Ok(())
}

#[test]
fn escape_fires_no_keypress() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.focus("#name")?;
    h.record_events(true);
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "{esc}", &options)?;
    assert_eq!(
        h.take_event_log(),
        vec!["keydown #name key=Escape", "keyup #name key=Escape"]
    );
    Ok(())
}

// ----- enter and space semantics -----

#[test]
fn enter_clicks_a_focused_button() -> Result<()> {
    let mut h = Harness::from_html("<button id='b'>Go</button>")?;
    let (clicks, clicks_inner) = counter();
    h.on("#b", "click", move |_, _| {
        clicks_inner.set(clicks_inner.get() + 1);
    })?;
    h.focus("#b")?;
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#b", "{enter}", &options)?;
    assert_eq!(clicks.get(), 1);
    Ok(())
}

#[test]
fn enter_inserts_a_line_break_in_a_textarea() -> Result<()> {
    let mut h = Harness::from_html("<textarea id='t'></textarea>")?;
    h.type_text("#t", "ab{enter}c")?;
    h.assert_value("#t", "ab\nc")?;
    Ok(())
}

#[test]
fn enter_submits_a_single_input_form() -> Result<()> {
    let mut h = Harness::from_html("<form id='f'><input id='q'></form>")?;
    let (submits, submits_inner) = counter();
    h.on("#f", "submit", move |_, _| {
        submits_inner.set(submits_inner.get() + 1);
    })?;
    h.type_text("#q", "hi{enter}")?;
    assert_eq!(submits.get(), 1);
    Ok(())
}

#[test]
fn enter_does_not_submit_a_multi_input_form_without_submit_control() -> Result<()> {
    let mut h = Harness::from_html("<form id='f'><input id='a'><input id='b'></form>")?;
    let (submits, submits_inner) = counter();
    h.on("#f", "submit", move |_, _| {
        submits_inner.set(submits_inner.get() + 1);
    })?;
    h.type_text("#a", "hi{enter}")?;
    assert_eq!(submits.get(), 0);
    Ok(())
}

#[test]
fn enter_submits_when_a_submit_button_exists() -> Result<()> {
    let mut h = Harness::from_html(
        "<form id='f'><input id='a'><input id='b'><button type='submit'>Go</button></form>",
    )?;
    let (submits, submits_inner) = counter();
    h.on("#f", "submit", move |_, _| {
        submits_inner.set(submits_inner.get() + 1);
    })?;
    h.type_text("#a", "hi{enter}")?;
    assert_eq!(submits.get(), 1);
    Ok(())
}

#[test]
fn canceled_enter_keydown_does_not_submit() -> Result<()> {
    let mut h = Harness::from_html("<form id='f'><input id='q'></form>")?;
    let (submits, submits_inner) = counter();
    h.on("#f", "submit", move |_, _| {
        submits_inner.set(submits_inner.get() + 1);
    })?;
    h.on("#q", "keydown", |_, event| {
        if event.init.key.as_deref() == Some("Enter") {
            event.prevent_default();
        }
    })?;
    h.type_text("#q", "hi{enter}")?;
    assert_eq!(submits.get(), 0);
    Ok(())
}

#[test]
fn space_clicks_a_button() -> Result<()> {
    let mut h = Harness::from_html("<button id='b'>Go</button>")?;
    let (clicks, clicks_inner) = counter();
    h.on("#b", "click", move |_, _| {
        clicks_inner.set(clicks_inner.get() + 1);
    })?;
    h.focus("#b")?;
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#b", "{space}", &options)?;
    assert_eq!(clicks.get(), 1);
    Ok(())
}

#[test]
fn canceled_keyup_blocks_the_space_click() -> Result<()> {
    let mut h = Harness::from_html("<button id='b'>Go</button>")?;
    let (clicks, clicks_inner) = counter();
    h.on("#b", "click", move |_, _| {
        clicks_inner.set(clicks_inner.get() + 1);
    })?;
    h.on("#b", "keyup", |_, event| {
        event.prevent_default();
    })?;
    h.focus("#b")?;
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#b", "{space}", &options)?;
    assert_eq!(clicks.get(), 0);
    Ok(())
}

#[test]
fn space_in_a_text_field_types_a_space() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "a{space}b")?;
    h.assert_value("#name", "a b")?;
    Ok(())
}

// ----- clear -----

#[test]
fn clear_empties_a_text_input() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='hello'>")?;
    h.clear("#name")?;
    h.assert_value("#name", "")?;
    h.assert_selection("#name", 0, 0)?;
    h.clear("#name")?;
    h.assert_value("#name", "")?;
    Ok(())
}

#[test]
fn clear_works_on_a_number_input_and_restores_its_type() -> Result<()> {
    let mut h = Harness::from_html("<input id='n' type='number' value='123'>")?;
    h.clear("#n")?;
    h.assert_value("#n", "")?;
    // Still behaves like a number input afterwards.
    h.type_text("#n", "45")?;
    h.assert_value("#n", "45")?;
    Ok(())
}

#[test]
fn clear_rejects_non_text_elements() -> Result<()> {
    let mut h = Harness::from_html("<div id='d'>hi</div>")?;
    match h.clear("#d") {
        Err(Error::UnsupportedElement { tag, .. }) => assert_eq!(tag, "div"),
        other => panic!("expected UnsupportedElement, got {other:?}"),
    }
    Ok(())
}

#[test]
fn clear_leaves_a_disabled_input_alone() -> Result<()> {
    let mut h = Harness::from_html("<input id='name' value='keep' disabled>")?;
    h.clear("#name")?;
    h.assert_value("#name", "keep")?;
    Ok(())
}

// ----- paste -----

#[test]
fn paste_appends_to_an_untouched_control() -> Result<()> {
    let mut h = Harness::from_html("<input id='p' value='ab'>")?;
    h.paste("#p", "cd")?;
    h.assert_value("#p", "abcd")?;
    Ok(())
}

#[test]
fn paste_replaces_the_current_selection() -> Result<()> {
    let mut h = Harness::from_html("<input id='p' value='abcd'>")?;
    h.set_selection_range("#p", 1, 3)?;
    h.paste("#p", "XY")?;
    h.assert_value("#p", "aXYd")?;
    h.assert_selection("#p", 3, 3)?;
    Ok(())
}

#[test]
fn paste_on_a_readonly_control_fires_paste_but_no_input() -> Result<()> {
    let mut h = Harness::from_html("<input id='p' value='keep' readonly>")?;
    let (pastes, pastes_inner) = counter();
    let (inputs, inputs_inner) = counter();
    h.on("#p", "paste", move |_, _| {
        pastes_inner.set(pastes_inner.get() + 1);
    })?;
    h.on("#p", "input", move |_, _| {
        inputs_inner.set(inputs_inner.get() + 1);
    })?;
    h.paste("#p", "x")?;
    h.assert_value("#p", "keep")?;
    assert_eq!(pastes.get(), 1);
    assert_eq!(inputs.get(), 0);
    Ok(())
}

#[test]
fn paste_rejects_elements_without_a_value() -> Result<()> {
    let mut h = Harness::from_html("<div id='d'></div>")?;
    assert!(matches!(
        h.paste("#d", "x"),
        Err(Error::InvalidValueType { .. })
    ));
    Ok(())
}

// ----- contenteditable and shadow DOM -----

#[test]
fn typing_into_contenteditable_updates_text_and_caret() -> Result<()> {
    let mut h = Harness::from_html("<div id='d' contenteditable='true'></div>")?;
    h.type_text("#d", "hi")?;
    assert_eq!(h.text("#d")?, "hi");
    assert_eq!(h.selection_range("#d")?, Some((2, 2)));
    Ok(())
}

#[test]
fn typing_reaches_a_control_inside_a_shadow_root() -> Result<()> {
    let mut h = Harness::from_html("<div id='host'></div>")?;
    h.attach_shadow("#host", "<input id='inner'>")?;
    h.type_text("#inner", "ok")?;
    h.assert_value("#inner", "ok")?;
    Ok(())
}

// ----- clicking -----

#[test]
fn click_press_sequence_on_a_plain_element() -> Result<()> {
    let mut h = Harness::from_html("<div id='d'></div>")?;
    h.record_events(true);
    h.click("#d")?;
    let log = h.take_event_log();
    let tail: Vec<&str> = log.iter().rev().take(5).rev().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "pointerdown #d",
            "mousedown #d",
            "pointerup #d",
            "mouseup #d",
            "click #d",
        ]
    );
    Ok(())
}

#[test]
fn clicking_a_checkbox_toggles_it() -> Result<()> {
    let mut h = Harness::from_html("<input id='cb' type='checkbox'>")?;
    let (changes, changes_inner) = counter();
    h.on("#cb", "change", move |_, _| {
        changes_inner.set(changes_inner.get() + 1);
    })?;
    h.click("#cb")?;
    assert!(h.is_checked("#cb")?);
    h.click("#cb")?;
    assert!(!h.is_checked("#cb")?);
    assert_eq!(changes.get(), 2);
    Ok(())
}

#[test]
fn clicking_a_radio_unchecks_its_group() -> Result<()> {
    let mut h = Harness::from_html(
        "<input id='r1' type='radio' name='g' checked><input id='r2' type='radio' name='g'>",
    )?;
    h.click("#r2")?;
    assert!(h.is_checked("#r2")?);
    assert!(!h.is_checked("#r1")?);
    Ok(())
}

#[test]
fn clicking_a_label_focuses_its_control() -> Result<()> {
    let mut h = Harness::from_html("<label for='name'>Name</label><input id='name'>")?;
    h.click("label[for=name]")?;
    assert!(h.is_focused("#name")?);
    Ok(())
}

#[test]
fn hover_and_unhover_fire_mouse_transitions() -> Result<()> {
    let mut h = Harness::from_html("<button id='b'>Go</button>")?;
    let (overs, overs_inner) = counter();
    let (outs, outs_inner) = counter();
    h.on("#b", "mouseover", move |_, _| {
        overs_inner.set(overs_inner.get() + 1);
    })?;
    h.on("#b", "mouseout", move |_, _| {
        outs_inner.set(outs_inner.get() + 1);
    })?;
    h.hover("#b")?;
    h.unhover("#b")?;
    assert_eq!(overs.get(), 1);
    assert_eq!(outs.get(), 1);
    Ok(())
}

// ----- virtual clock -----

#[test]
fn delay_advances_the_clock_per_keystroke() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    let options = TypeOptions {
        delay_ms: 10,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "abcd", &options)?;
    assert_eq!(h.now_ms(), 40);
    h.assert_value("#name", "abcd")?;
    Ok(())
}

#[test]
fn cleared_timeouts_never_run() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    let (fired, fired_inner) = counter();
    let id = h.set_timeout(5, move |_| {
        fired_inner.set(fired_inner.get() + 1);
    });
    assert!(h.clear_timeout(id));
    assert!(!h.clear_timeout(id));
    h.advance_time(50)?;
    assert_eq!(fired.get(), 0);
    Ok(())
}

#[test]
fn scheduled_tasks_run_between_delayed_keystrokes() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.set_timeout(15, |h| {
        let _ = h.set_disabled("#name", true);
    });
    let options = TypeOptions {
        delay_ms: 10,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "abcd", &options)?;
    // The timeout fires at the 20ms step, before the second keystroke.
    h.assert_value("#name", "a")?;
    Ok(())
}

// ----- selectors and assertions -----

#[test]
fn selectors_match_tag_id_class_and_attributes() -> Result<()> {
    let mut h = Harness::from_html(
        "<form><input id='a' class='wide' name='first'><input id='b' name='last'></form>",
    )?;
    h.type_text("input.wide", "x")?;
    h.assert_value("#a", "x")?;
    h.type_text("form input[name=last]", "y")?;
    h.assert_value("#b", "y")?;
    assert!(matches!(
        h.value("#missing"),
        Err(Error::SelectorNotFound(_))
    ));
    assert!(matches!(
        h.value("input[name"),
        Err(Error::UnsupportedSelector(_))
    ));
    Ok(())
}

#[test]
fn fire_event_reports_whether_the_default_proceeds() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    assert!(h.fire_event("#name", "change")?);
    h.on("#name", "change", |_, event| {
        event.prevent_default();
    })?;
    assert!(!h.fire_event("#name", "change")?);
    Ok(())
}

#[test]
fn capture_listeners_run_before_bubble_listeners() -> Result<()> {
    let mut h = Harness::from_html("<form id='f'><input id='name'></form>")?;
    let order = Rc::new(RefCell::new(Vec::new()));
    let capture_order = order.clone();
    h.on_capture("#f", "keydown", move |_, _| {
        capture_order.borrow_mut().push("capture");
    })?;
    let bubble_order = order.clone();
    h.on("#f", "keydown", move |_, _| {
        bubble_order.borrow_mut().push("bubble");
    })?;
    h.focus("#name")?;
    let options = TypeOptions {
        skip_click: true,
        ..TypeOptions::default()
    };
    h.type_text_with("#name", "a", &options)?;
    assert_eq!(*order.borrow(), vec!["capture", "bubble"]);
    Ok(())
}

#[test]
fn stop_propagation_halts_the_bubble() -> Result<()> {
    let mut h = Harness::from_html("<form id='f'><input id='name'></form>")?;
    let (outer, outer_inner) = counter();
    h.on("#name", "keydown", |_, event| {
        event.stop_propagation();
    })?;
    h.on("#f", "keydown", move |_, _| {
        outer_inner.set(outer_inner.get() + 1);
    })?;
    h.type_text("#name", "a")?;
    h.assert_value("#name", "a")?;
    assert_eq!(outer.get(), 0);
    Ok(())
}

#[test]
fn assertion_failures_carry_expected_and_actual() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.type_text("#name", "abc")?;
    let err = h.assert_value("#name", "xyz").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("xyz"));
    assert!(message.contains("abc"));
    Ok(())
}

#[test]
fn parse_errors_on_multibyte_fixtures_report_readable_context() {
    // Both messages quote the remaining input; the quote must cut on a
    // character boundary even when the input is non-ASCII.
    let err = Harness::from_html("<>ああああああああああ").unwrap_err();
    assert!(matches!(err, Error::HtmlParse(_)));
    let err = Harness::from_html("<input ==ああああああああああ>").unwrap_err();
    assert!(matches!(err, Error::HtmlParse(_)));
}

#[test]
fn event_log_evicts_the_oldest_lines_at_the_cap() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    h.record_events(true);
    h.fire_event("#name", "first")?;
    for _ in 0..10_000 {
        h.fire_event("#name", "ping")?;
    }
    let log = h.take_event_log();
    assert_eq!(log.len(), 10_000);
    assert_eq!(log[0], "ping #name");
    assert_eq!(log[log.len() - 1], "ping #name");
    Ok(())
}

#[test]
fn input_listener_typing_into_its_own_element_skips_itself() -> Result<()> {
    let mut h = Harness::from_html("<input id='name'>")?;
    let (inputs, inputs_inner) = counter();
    h.on("#name", "input", move |h, _| {
        inputs_inner.set(inputs_inner.get() + 1);
        if inputs_inner.get() == 1 {
            let options = TypeOptions {
                skip_click: true,
                ..TypeOptions::default()
            };
            let _ = h.type_text_with("#name", "!", &options);
        }
    })?;
    h.type_text("#name", "ab")?;
    h.assert_value("#name", "a!b")?;
    // The nested keystroke's input event reaches the listener while it is
    // still running and is skipped rather than re-entered.
    assert_eq!(inputs.get(), 2);
    Ok(())
}
