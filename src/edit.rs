//! In-place editing of the loaded text.
//!
//! While a session is open the controller is stopped and locked. Saving
//! splits the buffer on blank lines and installs the result as the new
//! paragraph list; cancelling leaves the document as it was.

use crate::document::DocumentModel;
use crate::narration::{NarrationController, NarrationEffect, NarrationEngine};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

static RE_BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("blank line regex"));

/// Rich-text commands forwarded to whatever renders the edit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatCommand {
    Bold,
    Italic,
    Undo,
    Redo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    buffer: String,
    dirty: bool,
}

impl EditSession {
    pub fn begin<E: NarrationEngine>(
        document: &DocumentModel,
        controller: &mut NarrationController<E>,
    ) -> (Self, Vec<NarrationEffect>) {
        let effects = controller.lock();
        let session = Self {
            buffer: document.joined_text(),
            dirty: false,
        };
        info!(
            paragraphs = document.paragraphs().len(),
            "Entered edit mode"
        );
        (session, effects)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
        self.dirty = true;
    }

    /// Record a formatting command. The buffer itself is owned by the renderer
    /// for rich-text purposes; only the dirty flag changes here.
    pub fn format(&mut self, command: FormatCommand) -> FormatCommand {
        debug!(?command, "Forwarding format command");
        self.dirty = true;
        command
    }

    /// Install the buffer as the document's paragraphs and release the
    /// controller at position 0.
    pub fn save<E: NarrationEngine>(
        self,
        document: &mut DocumentModel,
        controller: &mut NarrationController<E>,
    ) -> Vec<NarrationEffect> {
        let paragraphs = split_paragraphs(&self.buffer);
        info!(paragraphs = paragraphs.len(), "Saving edited text");
        document.replace_paragraphs(paragraphs);
        let effects = controller.reset();
        controller.unlock();
        effects
    }

    pub fn cancel<E: NarrationEngine>(self, controller: &mut NarrationController<E>) {
        info!(discarded_changes = self.dirty, "Left edit mode without saving");
        controller.unlock();
    }
}

/// Split edited text on blank lines; pieces are trimmed and empties dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    RE_BLANK_LINE
        .split(&normalized)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
