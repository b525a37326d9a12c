use crate::config::AppConfig;
use crate::generation::GenerationClient;
use crate::session::EditSession;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

/// Central application state shared by the GTK signal handlers.
pub struct AppState {
    /// Currently open file path, if any.
    pub current_file: Option<PathBuf>,
    pub config: AppConfig,
    /// Client for the active provider.
    pub client: GenerationClient,
    /// The edit session. Never hold a borrow across a GTK call that can
    /// re-enter a handler.
    pub session: Rc<RefCell<EditSession>>,
    /// Set while the buffer is being overwritten from the session, so the
    /// resulting change signals are not fed back as user edits.
    pub syncing_buffer: Rc<Cell<bool>>,
}

impl AppState {
    pub fn new(config: AppConfig, client: GenerationClient, document: &str) -> Self {
        Self {
            current_file: None,
            config,
            client,
            session: Rc::new(RefCell::new(EditSession::new(document))),
            syncing_buffer: Rc::new(Cell::new(false)),
        }
    }
}
