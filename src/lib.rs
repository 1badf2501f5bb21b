//! Simulated user input for deterministic DOM tests.
//!
//! This crate drives synthetic keyboard and pointer input against an
//! in-process DOM the way a real user would: one keystroke at a time, with
//! the full `keydown`/`keypress`/`input`/`keyup` sequence per character,
//! cancellable at every step, and with the focused element re-resolved
//! before every action.
//!
//! The main entry points live on [`Harness`]:
//!
//! - [`Harness::type_text`] types a directive string into an element. The
//!   string may contain bracketed tokens for special keys (`{enter}`,
//!   `{backspace}`, `{arrowleft}`, ...) and held modifiers
//!   (`{shift}A{/shift}`).
//! - [`Harness::clear`] selects all content of a text control and deletes it.
//! - [`Harness::click`], [`Harness::hover`] and friends provide the pointer
//!   sequences that typing builds on.
//!
//! ```
//! use user_sim::Harness;
//!
//! # fn main() -> user_sim::Result<()> {
//! let mut h = Harness::from_html("<input id='name' maxlength='4'>")?;
//! h.type_text("#name", "abcdef")?;
//! h.assert_value("#name", "abcd")?;
//! # Ok(())
//! # }
//! ```
//!
//! Everything is synchronous and deterministic. Pacing between keystrokes is
//! modeled on a virtual clock ([`Harness::advance_time`]); a typing delay
//! advances that clock before each action, which is the only point where
//! scheduled tasks get a chance to run.

use std::fmt;

mod dom;
mod edit;
mod events;
mod harness;
mod keyboard;
mod pointer;
mod selector;

#[cfg(test)]
mod tests;

pub use dom::NodeId;
pub use events::{EventInit, EventState};
pub use harness::Harness;
pub use keyboard::{PasteOptions, TypeOptions};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    /// `clear` was invoked on an element that cannot hold editable text.
    UnsupportedElement {
        selector: String,
        tag: String,
    },
    /// The target has no readable text value (e.g. `paste` into a `<div>`).
    InvalidValueType {
        selector: String,
        tag: String,
    },
    TaskLimitExceeded(usize),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::UnsupportedElement { selector, tag } => write!(
                f,
                "unsupported element for {selector}: <{tag}> cannot hold editable text"
            ),
            Self::InvalidValueType { selector, tag } => write!(
                f,
                "invalid value type for {selector}: <{tag}> has no readable value"
            ),
            Self::TaskLimitExceeded(limit) => {
                write!(f, "scheduled task limit exceeded ({limit} steps)")
            }
            Self::AssertionFailed {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected:?}, actual {actual:?}"
            ),
        }
    }
}

impl std::error::Error for Error {}
