//! A minimal inline editor for text overlays.
//!
//! There is no native text widget in a bare winit window, so typed
//! characters are appended to a plain-text buffer and the window title
//! shows what is being edited.  The view owns one handle as its
//! `EditorDelegate`; the app keeps a clone to feed keystrokes in.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use vellum_core::{EditorDelegate, EditorSession, OverlayId, Rect};
use vellum_text::html;

#[derive(Debug)]
struct Active {
    session: EditorSession,
    overlay: OverlayId,
    text: String,
}

#[derive(Debug, Default)]
struct EditorState {
    active: Option<Active>,
    next_session: u64,
}

#[derive(Clone, Default)]
pub struct InlineEditor {
    state: Rc<RefCell<EditorState>>,
}

impl InlineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().active.is_some()
    }

    /// Append typed text. Returns `false` when no editor is open.
    pub fn insert(&self, text: &str) -> bool {
        match self.state.borrow_mut().active.as_mut() {
            Some(active) => {
                active.text.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn backspace(&self) -> bool {
        match self.state.borrow_mut().active.as_mut() {
            Some(active) => {
                active.text.pop();
                true
            }
            None => false,
        }
    }

    /// Window title describing the edit in progress.
    pub fn title(&self) -> Option<String> {
        self.state
            .borrow()
            .active
            .as_ref()
            .map(|a| format!("Vellum (editing {}): {}_", a.overlay, a.text))
    }
}

impl EditorDelegate for InlineEditor {
    fn place_editor(&mut self, overlay: OverlayId, content: &str, viewport_rect: Rect) -> EditorSession {
        let mut state = self.state.borrow_mut();
        state.next_session += 1;
        let session = EditorSession(state.next_session);
        let text = html::plain_text(&html::parse(content));
        debug!("editor {session:?} opened on {overlay} at {viewport_rect}");
        state.active = Some(Active {
            session,
            overlay,
            text,
        });
        session
    }

    fn editor_html(&self, session: EditorSession) -> String {
        match self.state.borrow().active.as_ref() {
            Some(active) if active.session == session => to_html(&active.text),
            _ => String::new(),
        }
    }

    fn remove_editor(&mut self, session: EditorSession) {
        let mut state = self.state.borrow_mut();
        if state.active.as_ref().is_some_and(|a| a.session == session) {
            debug!("editor {session:?} closed");
            state.active = None;
        }
    }
}

/// Plain text to the overlay's HTML subset: one `<p>` per line.
fn to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.split('\n')
        .map(|line| format!("<p>{}</p>", escape(line)))
        .collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

// ===================================================================
// Tests
// ===================================================================
