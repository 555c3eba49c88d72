//! The reader facade a host drives.
//!
//! A `ReaderSession` owns the document, the narration controller, the voice
//! catalog and any open edit session. Every operation returns the
//! [`RenderUpdate`]s the host should apply; `snapshot` gives the whole view
//! at once. Requests that make no sense in the current state are logged at
//! debug level and produce no updates.

use crate::cancellation::CancellationToken;
use crate::config::AppConfig;
use crate::document::{DocumentModel, ParagraphLayout};
use crate::edit::{EditSession, FormatCommand};
use crate::error::{DocumentParseError, InvalidOperation, ReaderError};
use crate::extract::{FragmentSource, PdfFragmentSource};
use crate::narration::{
    EngineEvent, NarrationController, NarrationEffect, NarrationEngine, NarrationSettings, Notice,
    PlaybackState, VoiceCatalog, VoiceProfile,
};
use crate::reconstruct::TextReconstructor;
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MSG_LOADED: &str = "PDF loaded successfully! Click Play to start reading.";
const MSG_NO_TEXT: &str = "No readable text was found in this PDF.";
const MSG_NOT_PDF: &str = "Please select a valid PDF file.";
const MSG_PARSE_FAILED: &str = "Error processing PDF. Please try another file.";
const MSG_LOAD_CANCELLED: &str = "Loading cancelled.";
const MSG_COMPLETED: &str = "Reading completed!";
const MSG_SPEECH_ERROR: &str = "Speech synthesis error. Please try again.";
const MSG_SAVED: &str = "Changes saved successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Info,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// Which controls are shown and which are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControlsView {
    pub visible: bool,
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
    pub reset: bool,
    pub edit: bool,
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RenderUpdate {
    /// Paragraphs were replaced; redraw from `snapshot().paragraphs`.
    ParagraphsChanged,
    /// Highlight exactly this sentence, or none.
    Highlight(Option<usize>),
    Progress(f32),
    Status(Option<StatusMessage>),
    Controls(ControlsView),
    EditMode(bool),
    Format(FormatCommand),
    VoicesChanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderSnapshot {
    pub source_name: Option<String>,
    pub paragraphs: Vec<ParagraphLayout>,
    pub sentence_count: usize,
    pub highlighted_sentence: Option<usize>,
    pub progress_pct: f64,
    pub state: PlaybackState,
    pub position: usize,
    pub rate: f32,
    pub voices: Vec<VoiceProfile>,
    pub selected_voice: Option<String>,
    pub controls: ControlsView,
    pub status: Option<StatusMessage>,
    pub edit_mode: bool,
    pub edit_buffer: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SessionCommand {
    GetSnapshot,
    LoadPath { path: PathBuf },
    Play,
    Pause,
    Stop,
    Reset,
    SetRate { rate: f32 },
    SelectVoice { name: String },
    RefreshVoices,
    EnterEdit,
    UpdateEditText { text: String },
    Format { command: FormatCommand },
    SaveEdit,
    CancelEdit,
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "reader_get_snapshot",
            Self::LoadPath { .. } => "reader_load_path",
            Self::Play => "reader_play",
            Self::Pause => "reader_pause",
            Self::Stop => "reader_stop",
            Self::Reset => "reader_reset",
            Self::SetRate { .. } => "reader_set_rate",
            Self::SelectVoice { .. } => "reader_select_voice",
            Self::RefreshVoices => "reader_refresh_voices",
            Self::EnterEdit => "reader_enter_edit",
            Self::UpdateEditText { .. } => "reader_update_edit_text",
            Self::Format { .. } => "reader_format",
            Self::SaveEdit => "reader_save_edit",
            Self::CancelEdit => "reader_cancel_edit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub action: &'static str,
    pub updates: Vec<RenderUpdate>,
    pub snapshot: ReaderSnapshot,
}

pub struct ReaderSession<E: NarrationEngine> {
    config: AppConfig,
    source: Box<dyn FragmentSource>,
    reconstructor: TextReconstructor,
    document: DocumentModel,
    source_name: Option<String>,
    controller: NarrationController<E>,
    voices: VoiceCatalog,
    edit: Option<EditSession>,
    highlight: Option<usize>,
    progress: f32,
    status: Option<StatusMessage>,
    status_expires: Option<Instant>,
    controls_visible: bool,
    active_load: Option<CancellationToken>,
}

impl<E: NarrationEngine> ReaderSession<E> {
    pub fn new(config: AppConfig, engine: E) -> Self {
        Self::with_source(config, engine, Box::new(PdfFragmentSource::new()))
    }

    pub fn with_source(config: AppConfig, engine: E, source: Box<dyn FragmentSource>) -> Self {
        let controller = NarrationController::new(engine, NarrationSettings::from_config(&config));
        let mut session = Self {
            reconstructor: TextReconstructor::from_config(&config),
            voices: VoiceCatalog::from_config(&config),
            config,
            source,
            document: DocumentModel::default(),
            source_name: None,
            controller,
            edit: None,
            highlight: None,
            progress: 0.0,
            status: None,
            status_expires: None,
            controls_visible: false,
            active_load: None,
        };
        session.refresh_voices();
        session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document(&self) -> &DocumentModel {
        &self.document
    }

    pub fn controller(&self) -> &NarrationController<E> {
        &self.controller
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.controller.engine_mut()
    }

    pub fn voices(&self) -> &VoiceCatalog {
        &self.voices
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn controls(&self) -> ControlsView {
        if !self.controls_visible {
            return ControlsView::default();
        }
        if let Some(edit) = &self.edit {
            return ControlsView {
                visible: true,
                save: edit.is_dirty(),
                ..ControlsView::default()
            };
        }
        let state = self.controller.state();
        let speaking = state.is_speaking();
        ControlsView {
            visible: true,
            play: !speaking,
            pause: speaking,
            stop: speaking || self.controller.is_paused(),
            reset: true,
            edit: true,
            save: false,
        }
    }

    /// Earliest instant at which [`Self::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.controller.next_deadline(), self.status_expires) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            source_name: self.source_name.clone(),
            paragraphs: self.document.layout(),
            sentence_count: self.document.sentences().len(),
            highlighted_sentence: self.highlight,
            progress_pct: f64::from(self.progress) * 100.0,
            state: self.controller.state(),
            position: self.controller.position(),
            rate: self.controller.rate(),
            voices: self.voices.voices().to_vec(),
            selected_voice: self.voices.selected_profile().map(|voice| voice.name.clone()),
            controls: self.controls(),
            status: self.status.clone(),
            edit_mode: self.edit.is_some(),
            edit_buffer: self.edit.as_ref().map(|e| e.buffer().to_string()),
        }
    }

    /// Run a command for a UI. Requests that do nothing are logged and
    /// dropped; load failures come back as the error status.
    pub fn apply_command(&mut self, command: SessionCommand) -> SessionEvent {
        let action = command.action();
        let updates = match self.execute(command) {
            Ok(updates) => updates,
            Err(ReaderError::InvalidOperation(err)) => ignore(action, err),
            Err(ReaderError::DocumentParse(err)) => {
                debug!(action, "Load failed: {err}");
                vec![RenderUpdate::Status(self.status.clone())]
            }
            Err(ReaderError::Engine(err)) => {
                warn!(action, "Narration engine error: {err}");
                vec![self.set_status(StatusKind::Error, MSG_SPEECH_ERROR)]
            }
        };
        SessionEvent {
            action,
            updates,
            snapshot: self.snapshot(),
        }
    }

    /// Run a command and report why it did nothing, if it did nothing.
    pub fn execute(&mut self, command: SessionCommand) -> Result<Vec<RenderUpdate>, ReaderError> {
        let updates = match command {
            SessionCommand::GetSnapshot => Vec::new(),
            SessionCommand::LoadPath { path } => self.read_pdf(&path)?,
            SessionCommand::Play => self.try_play()?,
            SessionCommand::Pause => self.try_pause()?,
            SessionCommand::Stop => self.stop(),
            SessionCommand::Reset => self.reset(),
            SessionCommand::SetRate { rate } => self.set_rate(rate),
            SessionCommand::SelectVoice { name } => self.select_voice(&name),
            SessionCommand::RefreshVoices => self.refresh_voices(),
            SessionCommand::EnterEdit => self.try_enter_edit()?,
            SessionCommand::UpdateEditText { text } => self.try_update_edit_text(text)?,
            SessionCommand::Format { command } => self.try_format(command)?,
            SessionCommand::SaveEdit => self.try_save_edit()?,
            SessionCommand::CancelEdit => self.try_cancel_edit()?,
        };
        Ok(updates)
    }

    // -- Loading ----------------------------------------------------------

    /// Show a loading status and hand out a token that cancels the next load.
    pub fn begin_load(&mut self, name: &str) -> (CancellationToken, Vec<RenderUpdate>) {
        let token = CancellationToken::new();
        self.active_load = Some(token.clone());
        let update = self.set_status(StatusKind::Loading, format!("Processing {name}..."));
        (token, vec![update])
    }

    pub fn cancel_load(&mut self) {
        if let Some(token) = self.active_load.take() {
            info!("Cancelling document load");
            token.cancel();
        }
    }

    pub fn load_path(&mut self, path: &Path) -> anyhow::Result<Vec<RenderUpdate>> {
        self.read_pdf(path)
            .with_context(|| format!("Loading {}", path.display()))
    }

    fn read_pdf(&mut self, path: &Path) -> Result<Vec<RenderUpdate>, DocumentParseError> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            let err = DocumentParseError::Unsupported(path.display().to_string());
            self.fail_load(&err);
            return Err(err);
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = DocumentParseError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                self.fail_load(&err);
                return Err(err);
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.load_bytes(&name, &bytes)
    }

    pub fn load_bytes(
        &mut self,
        name: &str,
        bytes: &[u8],
    ) -> Result<Vec<RenderUpdate>, DocumentParseError> {
        let cancel = self.active_load.take().unwrap_or_default();
        self.load_with_cancel(name, bytes, &cancel)
    }

    /// Extract and install a document. On failure the current document, if
    /// any, stays in place and an error status is shown.
    pub fn load_with_cancel(
        &mut self,
        name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<RenderUpdate>, DocumentParseError> {
        info!(name, bytes = bytes.len(), "Loading document");
        let pages = match self.source.extract(bytes, cancel) {
            Ok(pages) => pages,
            Err(err) => {
                self.fail_load(&err);
                return Err(err);
            }
        };
        let document = DocumentModel::from_pages(&pages, &self.reconstructor);
        info!(
            name,
            pages = pages.len(),
            paragraphs = document.paragraphs().len(),
            sentences = document.sentences().len(),
            "Document ready"
        );
        Ok(self.install(name, document))
    }

    fn install(&mut self, name: &str, document: DocumentModel) -> Vec<RenderUpdate> {
        let before = self.controls();
        let mut updates = Vec::new();

        if let Some(edit) = self.edit.take() {
            edit.cancel(&mut self.controller);
            updates.push(RenderUpdate::EditMode(false));
        }
        let effects = self.controller.stop();
        self.document = document;
        self.source_name = Some(name.to_string());
        self.controls_visible = true;

        updates.push(RenderUpdate::ParagraphsChanged);
        self.apply_effects(effects, &mut updates);
        let status = if self.document.is_empty() {
            self.set_status(StatusKind::Info, MSG_NO_TEXT)
        } else {
            self.set_status(StatusKind::Success, MSG_LOADED)
        };
        updates.push(status);
        self.push_controls_if_changed(before, &mut updates);
        updates
    }

    fn fail_load(&mut self, err: &DocumentParseError) {
        warn!("Failed to load document: {err}");
        let text = match err {
            DocumentParseError::Unsupported(_) => MSG_NOT_PDF,
            DocumentParseError::Cancelled { .. } => MSG_LOAD_CANCELLED,
            DocumentParseError::Io { .. } | DocumentParseError::Corrupt(_) => MSG_PARSE_FAILED,
        };
        self.set_status(StatusKind::Error, text);
    }

    // -- Narration --------------------------------------------------------

    pub fn play(&mut self) -> Vec<RenderUpdate> {
        self.try_play().unwrap_or_else(|err| ignore("play", err))
    }

    fn try_play(&mut self) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let before = self.controls();
        let effects = self.controller.play(self.document.sentences())?;
        Ok(self.finish(before, effects))
    }

    pub fn pause(&mut self) -> Vec<RenderUpdate> {
        self.try_pause().unwrap_or_else(|err| ignore("pause", err))
    }

    fn try_pause(&mut self) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let before = self.controls();
        self.controller.pause()?;
        Ok(self.finish(before, Vec::new()))
    }

    pub fn stop(&mut self) -> Vec<RenderUpdate> {
        let before = self.controls();
        let effects = self.controller.stop();
        self.finish(before, effects)
    }

    pub fn reset(&mut self) -> Vec<RenderUpdate> {
        let before = self.controls();
        let effects = self.controller.reset();
        self.finish(before, effects)
    }

    pub fn set_rate(&mut self, rate: f32) -> Vec<RenderUpdate> {
        self.controller.set_rate(rate);
        Vec::new()
    }

    pub fn select_voice(&mut self, name: &str) -> Vec<RenderUpdate> {
        if !self.voices.select(name) {
            return Vec::new();
        }
        info!(voice = name, "Voice selected");
        self.controller
            .set_voice(self.voices.selected().map(str::to_string));
        vec![RenderUpdate::VoicesChanged]
    }

    /// Re-read the engine's voices, e.g. after the platform reports a change.
    pub fn refresh_voices(&mut self) -> Vec<RenderUpdate> {
        let available = self.controller.engine().list_voices();
        if !self.voices.refresh(&available) {
            return Vec::new();
        }
        self.controller
            .set_voice(self.voices.selected().map(str::to_string));
        vec![RenderUpdate::VoicesChanged]
    }

    /// Feed a completion or failure reported by the host's engine callbacks.
    pub fn on_engine_event(&mut self, event: EngineEvent) -> Vec<RenderUpdate> {
        let before = self.controls();
        let effects =
            self.controller
                .on_engine_event(event, self.document.sentences(), Instant::now());
        self.finish(before, effects)
    }

    /// Pump the engine, run due sentence advances and expire the status line.
    pub fn tick(&mut self, now: Instant) -> Vec<RenderUpdate> {
        let before = self.controls();
        let effects = self.controller.tick(self.document.sentences(), now);
        let mut updates = self.finish(before, effects);

        if self.status_expires.is_some_and(|due| now >= due) {
            debug!("Clearing status message");
            self.status = None;
            self.status_expires = None;
            updates.push(RenderUpdate::Status(None));
        }
        updates
    }

    // -- Editing ----------------------------------------------------------

    pub fn enter_edit(&mut self) -> Vec<RenderUpdate> {
        self.try_enter_edit()
            .unwrap_or_else(|err| ignore("enter_edit", err))
    }

    fn try_enter_edit(&mut self) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        if self.edit.is_some() {
            return Err(InvalidOperation::EditInProgress);
        }
        let before = self.controls();
        let (edit, effects) = EditSession::begin(&self.document, &mut self.controller);
        self.edit = Some(edit);
        let mut updates = vec![RenderUpdate::EditMode(true)];
        updates.extend(self.finish(before, effects));
        Ok(updates)
    }

    pub fn update_edit_text(&mut self, text: String) -> Vec<RenderUpdate> {
        self.try_update_edit_text(text)
            .unwrap_or_else(|err| ignore("update_edit_text", err))
    }

    fn try_update_edit_text(&mut self, text: String) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let before = self.controls();
        self.edit
            .as_mut()
            .ok_or(InvalidOperation::NotEditing)?
            .set_text(text);
        Ok(self.finish(before, Vec::new()))
    }

    pub fn format(&mut self, command: FormatCommand) -> Vec<RenderUpdate> {
        self.try_format(command)
            .unwrap_or_else(|err| ignore("format", err))
    }

    fn try_format(&mut self, command: FormatCommand) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let before = self.controls();
        let command = self
            .edit
            .as_mut()
            .ok_or(InvalidOperation::NotEditing)?
            .format(command);
        let mut updates = vec![RenderUpdate::Format(command)];
        updates.extend(self.finish(before, Vec::new()));
        Ok(updates)
    }

    pub fn save_edit(&mut self) -> Vec<RenderUpdate> {
        self.try_save_edit()
            .unwrap_or_else(|err| ignore("save_edit", err))
    }

    fn try_save_edit(&mut self) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let edit = self.edit.take().ok_or(InvalidOperation::NotEditing)?;
        let before = self.controls();
        let effects = edit.save(&mut self.document, &mut self.controller);
        let mut updates = vec![RenderUpdate::EditMode(false), RenderUpdate::ParagraphsChanged];
        updates.extend(self.finish(before, effects));
        updates.push(self.set_status(StatusKind::Success, MSG_SAVED));
        Ok(updates)
    }

    pub fn cancel_edit(&mut self) -> Vec<RenderUpdate> {
        self.try_cancel_edit()
            .unwrap_or_else(|err| ignore("cancel_edit", err))
    }

    fn try_cancel_edit(&mut self) -> Result<Vec<RenderUpdate>, InvalidOperation> {
        let edit = self.edit.take().ok_or(InvalidOperation::NotEditing)?;
        let before = self.controls();
        edit.cancel(&mut self.controller);
        let mut updates = vec![RenderUpdate::EditMode(false)];
        updates.extend(self.finish(before, Vec::new()));
        Ok(updates)
    }

    // -- Helpers ----------------------------------------------------------

    fn finish(&mut self, before: ControlsView, effects: Vec<NarrationEffect>) -> Vec<RenderUpdate> {
        let mut updates = Vec::new();
        self.apply_effects(effects, &mut updates);
        self.push_controls_if_changed(before, &mut updates);
        updates
    }

    fn push_controls_if_changed(&self, before: ControlsView, updates: &mut Vec<RenderUpdate>) {
        let after = self.controls();
        if after != before {
            updates.push(RenderUpdate::Controls(after));
        }
    }

    fn apply_effects(&mut self, effects: Vec<NarrationEffect>, updates: &mut Vec<RenderUpdate>) {
        for effect in effects {
            match effect {
                NarrationEffect::Highlight(idx) => {
                    self.highlight = idx;
                    updates.push(RenderUpdate::Highlight(idx));
                }
                NarrationEffect::Progress(progress) => {
                    self.progress = progress;
                    updates.push(RenderUpdate::Progress(progress));
                }
                NarrationEffect::Notice(Notice::ReadingCompleted) => {
                    updates.push(self.set_status(StatusKind::Success, MSG_COMPLETED));
                }
                NarrationEffect::Notice(Notice::EngineError(message)) => {
                    debug!(%message, "Surfacing narration error");
                    updates.push(self.set_status(StatusKind::Error, MSG_SPEECH_ERROR));
                }
            }
        }
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) -> RenderUpdate {
        let message = StatusMessage {
            kind,
            text: text.into(),
        };
        self.status_expires = match kind {
            StatusKind::Success | StatusKind::Error => Some(
                Instant::now()
                    + Duration::try_from_secs_f32(self.config.status_clear_secs)
                        .unwrap_or(Duration::ZERO),
            ),
            StatusKind::Info | StatusKind::Loading => None,
        };
        self.status = Some(message.clone());
        RenderUpdate::Status(Some(message))
    }
}

fn ignore(action: &'static str, err: InvalidOperation) -> Vec<RenderUpdate> {
    debug!(action, "Ignoring request: {err}");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Fragment, PageFragments};
    use crate::narration::EngineVoice;
    use crate::narration::testing::{EngineCall, RecordingEngine};

    /// Pages separated by form feeds, one fragment per line.
    struct TextPages;

    impl FragmentSource for TextPages {
        fn extract(
            &self,
            bytes: &[u8],
            cancel: &CancellationToken,
        ) -> Result<Vec<PageFragments>, DocumentParseError> {
            if bytes == b"bad" {
                return Err(DocumentParseError::Corrupt("bad bytes".to_string()));
            }
            let text = String::from_utf8_lossy(bytes);
            let mut pages = Vec::new();
            for (idx, page) in text.split('\x0c').enumerate() {
                cancel.check_cancelled("page")?;
                let fragments = page
                    .lines()
                    .enumerate()
                    .map(|(line, s)| Fragment::new(s, 72.0, 700.0 - 20.0 * line as f32))
                    .collect();
                pages.push(PageFragments::new(idx + 1, fragments));
            }
            Ok(pages)
        }
    }

    fn session() -> ReaderSession<RecordingEngine> {
        session_with(RecordingEngine::new())
    }

    fn session_with(engine: RecordingEngine) -> ReaderSession<RecordingEngine> {
        ReaderSession::with_source(AppConfig::default(), engine, Box::new(TextPages))
    }

    fn later(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    /// End the sentence being spoken and let the delayed advance run.
    fn finish_sentence(session: &mut ReaderSession<RecordingEngine>) -> Vec<RenderUpdate> {
        session.engine_mut().finish_current();
        let now = later(0);
        let mut updates = session.tick(now);
        updates.extend(session.tick(now + Duration::from_millis(150)));
        updates
    }

    #[test]
    fn loads_and_reads_a_document_to_completion() {
        let mut session = session();
        let updates = session
            .load_bytes("two.pdf", b"First line of the para-\ngraph. Second one!\x0cNext page")
            .expect("document loads");

        assert!(updates.contains(&RenderUpdate::ParagraphsChanged));
        assert_eq!(
            session.document().sentences(),
            ["First line of the paragraph.", "Second one!", "Next page"]
        );
        assert!(session.controls().visible);

        let started = session.play();
        assert_eq!(started[0], RenderUpdate::Highlight(Some(0)));
        assert_eq!(started[1], RenderUpdate::Progress(0.0));

        finish_sentence(&mut session);
        finish_sentence(&mut session);
        let last = finish_sentence(&mut session);

        assert!(last.contains(&RenderUpdate::Highlight(None)));
        assert_eq!(
            session.status().map(|s| s.text.as_str()),
            Some(MSG_COMPLETED)
        );
        assert_eq!(session.controller().state(), PlaybackState::Stopped);
        assert_eq!(
            session.controller().engine().spoken(),
            session.document().sentences()
        );
    }

    #[test]
    fn completion_resets_progress_and_highlight() {
        let mut session = session();
        session.load_bytes("three.pdf", b"One. Two. Three.").expect("loads");
        session.play();
        finish_sentence(&mut session);
        finish_sentence(&mut session);
        assert!(session.snapshot().progress_pct > 60.0);

        let updates = finish_sentence(&mut session);
        assert!(updates.contains(&RenderUpdate::Progress(0.0)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Stopped);
        assert_eq!(snapshot.position, 0);
        assert_eq!(snapshot.progress_pct, 0.0);
        assert_eq!(snapshot.highlighted_sentence, None);
    }

    #[test]
    fn execute_reports_why_a_command_did_nothing() {
        let mut session = session();
        assert!(matches!(
            session.execute(SessionCommand::Play),
            Err(ReaderError::InvalidOperation(InvalidOperation::NoSentences))
        ));
        assert!(matches!(
            session.execute(SessionCommand::SaveEdit),
            Err(ReaderError::InvalidOperation(InvalidOperation::NotEditing))
        ));
        assert!(matches!(
            session.execute(SessionCommand::LoadPath {
                path: PathBuf::from("notes.txt")
            }),
            Err(ReaderError::DocumentParse(DocumentParseError::Unsupported(_)))
        ));

        session.load_bytes("doc.pdf", b"Text.").expect("loads");
        session.execute(SessionCommand::EnterEdit).expect("edit opens");
        assert!(matches!(
            session.execute(SessionCommand::EnterEdit),
            Err(ReaderError::InvalidOperation(InvalidOperation::EditInProgress))
        ));

        let event = session.apply_command(SessionCommand::LoadPath {
            path: PathBuf::from("notes.txt"),
        });
        assert!(matches!(
            event.updates.as_slice(),
            [RenderUpdate::Status(Some(StatusMessage { kind: StatusKind::Error, .. }))]
        ));
    }

    #[test]
    fn failed_load_keeps_previous_document() {
        let mut session = session();
        session.load_bytes("good.pdf", b"Keep this.").expect("loads");
        let before = session.document().clone();

        let err = session.load_bytes("bad.pdf", b"bad").expect_err("must fail");
        assert!(matches!(err, DocumentParseError::Corrupt(_)));
        assert_eq!(session.document(), &before);
        assert_eq!(
            session.status(),
            Some(&StatusMessage {
                kind: StatusKind::Error,
                text: MSG_PARSE_FAILED.to_string()
            })
        );
    }

    #[test]
    fn load_path_rejects_other_extensions_and_missing_files() {
        let mut session = session();

        let err = session
            .load_path(Path::new("notes.txt"))
            .expect_err("txt is not accepted");
        assert!(matches!(
            err.downcast_ref::<DocumentParseError>(),
            Some(DocumentParseError::Unsupported(_))
        ));
        assert_eq!(session.status().map(|s| s.text.as_str()), Some(MSG_NOT_PDF));

        let err = session
            .load_path(Path::new("/nonexistent/pdf-narrator/missing.pdf"))
            .expect_err("missing file fails");
        assert!(matches!(
            err.downcast_ref::<DocumentParseError>(),
            Some(DocumentParseError::Io { .. })
        ));
    }

    #[test]
    fn cancelled_load_reports_and_installs_nothing() {
        let mut session = session();
        let (token, updates) = session.begin_load("slow.pdf");
        assert!(matches!(
            updates.as_slice(),
            [RenderUpdate::Status(Some(StatusMessage { kind: StatusKind::Loading, .. }))]
        ));
        token.cancel();

        let err = session.load_bytes("slow.pdf", b"Text.").expect_err("cancelled");
        assert!(matches!(err, DocumentParseError::Cancelled { .. }));
        assert!(session.document().is_empty());
    }

    #[test]
    fn status_clears_after_timeout() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"Hello.").expect("loads");
        assert!(session.status().is_some());
        assert!(session.next_deadline().is_some());

        assert!(!session.tick(later(1_000)).contains(&RenderUpdate::Status(None)));
        let updates = session.tick(later(3_500));
        assert!(updates.contains(&RenderUpdate::Status(None)));
        assert!(session.status().is_none());
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn controls_follow_playback_state() {
        let mut session = session();
        assert_eq!(session.controls(), ControlsView::default());
        session.load_bytes("doc.pdf", b"One. Two.").expect("loads");

        let idle = session.controls();
        assert!(idle.play && !idle.pause && !idle.stop && idle.reset);

        let updates = session.play();
        let speaking = session.controls();
        assert!(!speaking.play && speaking.pause && speaking.stop);
        assert!(updates.contains(&RenderUpdate::Controls(speaking)));

        session.pause();
        let paused = session.controls();
        assert!(paused.play && !paused.pause && paused.stop);

        session.stop();
        let stopped = session.controls();
        assert!(stopped.play && !stopped.pause && !stopped.stop);
    }

    #[test]
    fn invalid_requests_produce_no_updates() {
        let mut session = session();
        assert!(session.play().is_empty());
        assert!(session.pause().is_empty());
        assert!(session.save_edit().is_empty());
        assert!(session.format(FormatCommand::Bold).is_empty());
        assert!(session.controller().engine().calls.is_empty());
    }

    #[test]
    fn edit_session_round_trip_through_commands() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"Original text.").expect("loads");
        session.play();

        let event = session.apply_command(SessionCommand::EnterEdit);
        assert_eq!(event.action, "reader_enter_edit");
        assert!(event.updates.contains(&RenderUpdate::EditMode(true)));
        assert!(event.snapshot.edit_mode);
        assert_eq!(event.snapshot.edit_buffer.as_deref(), Some("Original text."));
        let locked = event.snapshot.controls;
        assert!(!locked.play && !locked.pause && !locked.stop && !locked.reset && !locked.save);
        assert!(session.play().is_empty());

        let event = session.apply_command(SessionCommand::UpdateEditText {
            text: "New first. New second.\n\nAnother paragraph.".to_string(),
        });
        assert!(event.snapshot.controls.save);

        let event = session.apply_command(SessionCommand::SaveEdit);
        assert!(event.updates.contains(&RenderUpdate::ParagraphsChanged));
        assert!(!event.snapshot.edit_mode);
        assert_eq!(event.snapshot.paragraphs.len(), 2);
        assert_eq!(event.snapshot.sentence_count, 3);
        assert_eq!(event.snapshot.position, 0);
        assert_eq!(
            event.snapshot.status.map(|s| s.text),
            Some(MSG_SAVED.to_string())
        );
        assert!(event.snapshot.controls.play);
    }

    #[test]
    fn cancelled_edit_leaves_document_untouched() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"Keep me.").expect("loads");
        let before = session.document().clone();

        session.enter_edit();
        session.update_edit_text("Replaced.".to_string());
        let updates = session.cancel_edit();

        assert!(updates.contains(&RenderUpdate::EditMode(false)));
        assert_eq!(session.document(), &before);
        assert!(session.controls().play);
    }

    #[test]
    fn engine_error_surfaces_and_play_retries() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"One. Two.").expect("loads");
        session.play();
        let id = session
            .controller()
            .engine()
            .last_utterance()
            .map(|u| u.id)
            .expect("spoken");
        session.engine_mut().current = None;

        let updates = session.on_engine_event(EngineEvent::failed(id, "synth crashed"));
        assert!(updates.iter().any(|u| matches!(
            u,
            RenderUpdate::Status(Some(StatusMessage { kind: StatusKind::Error, .. }))
        )));
        assert_eq!(session.controller().state(), PlaybackState::Idle);

        session.play();
        assert_eq!(session.controller().engine().spoken(), ["One.", "One."]);
    }

    #[test]
    fn voice_selection_reaches_utterances() {
        let engine = RecordingEngine::with_voices(vec![
            EngineVoice::new("Aria Neural", "en-US", true),
            EngineVoice::new("Google UK English Male", "en-GB", false),
        ]);
        let mut session = session_with(engine);
        assert_eq!(session.voices().selected(), Some("Aria Neural"));

        let event = session.apply_command(SessionCommand::SelectVoice {
            name: "Google UK English Male".to_string(),
        });
        assert_eq!(event.updates, vec![RenderUpdate::VoicesChanged]);
        assert_eq!(
            event.snapshot.selected_voice.as_deref(),
            Some("Google UK English Male")
        );

        session.load_bytes("doc.pdf", b"Hello.").expect("loads");
        session.play();
        assert_eq!(
            session
                .controller()
                .engine()
                .last_utterance()
                .and_then(|u| u.voice.clone())
                .as_deref(),
            Some("Google UK English Male")
        );
    }

    #[test]
    fn rate_command_updates_speech_in_flight() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"Hello there.").expect("loads");
        session.play();

        let event = session.apply_command(SessionCommand::SetRate { rate: 1.5 });
        assert_eq!(event.snapshot.rate, 1.5);
        assert_eq!(
            session.controller().engine().calls.last(),
            Some(&EngineCall::SetRate(1.5))
        );
    }

    #[test]
    fn snapshot_serializes() {
        let mut session = session();
        session.load_bytes("doc.pdf", b"A. B.").expect("loads");
        let snapshot = session.snapshot();
        assert_eq!(snapshot.paragraphs[0].sentences.len(), 2);
        assert_eq!(snapshot.state, PlaybackState::Stopped);
        let rendered = toml::to_string(&snapshot.controls).expect("controls serialize");
        assert!(rendered.contains("play = true"));
    }
}
