use crate::session::EditSession;
use crate::state::AppState;
use adw::StyleManager;
use gtk4::prelude::*;
use gtk4::{Label, ScrolledWindow};
use sourceview5::prelude::*;
use sourceview5::{Buffer, LanguageManager, StyleSchemeManager, View};
use std::cell::RefCell;
use std::rc::Rc;

/// Tag painting the tracked selection while the editor is unfocused.
pub const PASSIVE_SELECTION_TAG: &str = "passive-selection";

/// Creates the text editor component with LaTeX syntax highlighting, undo support,
/// and theme synchronization.
pub fn create_editor(style_manager: &StyleManager) -> (Buffer, View, ScrolledWindow) {
    let lang_manager = LanguageManager::default();
    let lang = lang_manager.language("latex");
    let buffer = Buffer::new(None);
    buffer.set_language(lang.as_ref());
    buffer.set_highlight_syntax(true);
    buffer.set_enable_undo(true);
    buffer.set_highlight_matching_brackets(true);

    let passive_tag = gtk4::TextTag::builder()
        .name(PASSIVE_SELECTION_TAG)
        .background("rgba(53, 132, 228, 0.35)")
        .build();
    buffer.tag_table().add(&passive_tag);

    let editor_view = View::with_buffer(&buffer);
    editor_view.set_monospace(true);
    editor_view.set_show_line_numbers(true);
    editor_view.set_highlight_current_line(true);
    editor_view.set_auto_indent(true);
    editor_view.set_insert_spaces_instead_of_tabs(true);
    editor_view.set_indent_width(2);
    editor_view.set_wrap_mode(gtk4::WrapMode::WordChar);
    editor_view.set_smart_backspace(true);

    fn update_editor_theme(buffer: &Buffer, is_dark: bool) {
        let scheme_manager = StyleSchemeManager::default();
        let scheme_id = if is_dark { "Adwaita-dark" } else { "Adwaita" };
        if let Some(scheme) = scheme_manager.scheme(scheme_id) {
            buffer.set_style_scheme(Some(&scheme));
        } else {
            let fallback = if is_dark { "classic-dark" } else { "classic" };
            if let Some(scheme) = scheme_manager.scheme(fallback) {
                buffer.set_style_scheme(Some(&scheme));
            }
        }
    }

    update_editor_theme(&buffer, style_manager.is_dark());

    style_manager.connect_dark_notify(glib::clone!(
        #[weak]
        buffer,
        move |sm| {
            update_editor_theme(&buffer, sm.is_dark());
        }
    ));

    let editor_scroll = ScrolledWindow::builder()
        .child(&editor_view)
        .hexpand(true)
        .vexpand(true)
        .build();

    (buffer, editor_view, editor_scroll)
}

pub fn buffer_text(buffer: &Buffer) -> String {
    let (start, end) = buffer.bounds();
    buffer.text(&start, &end, false).to_string()
}

/// Repaints the passive highlight from the session's canonical document.
pub fn refresh_highlight(buffer: &Buffer, session: &RefCell<EditSession>) {
    let (start, end) = buffer.bounds();
    buffer.remove_tag_by_name(PASSIVE_SELECTION_TAG, &start, &end);

    let range = session.borrow().highlight().map(|hl| {
        let start = hl.before.chars().count();
        (start, start + hl.selected.chars().count())
    });
    if let Some((start, end)) = range {
        let start = buffer.iter_at_offset(start as i32);
        let end = buffer.iter_at_offset(end as i32);
        buffer.apply_tag_by_name(PASSIVE_SELECTION_TAG, &start, &end);
    }
}

/// Wires the buffer to the session in both directions.
///
/// Session writes arrive through the document watch channel and overwrite
/// the buffer; buffer changes made by the user go back as edits. Writes
/// coming from the session are flagged so they are not echoed back.
pub fn bind_session(
    buffer: &Buffer,
    editor_view: &View,
    state: Rc<RefCell<AppState>>,
    pos_label: &Label,
    selection_label: &Label,
) {
    let (session, syncing) = {
        let s = state.borrow();
        (s.session.clone(), s.syncing_buffer.clone())
    };

    let initial = session.borrow().document().to_string();
    syncing.set(true);
    buffer.set_text(&initial);
    syncing.set(false);

    let mut updates = session.borrow().subscribe();
    glib::MainContext::default().spawn_local(glib::clone!(
        #[weak]
        buffer,
        #[weak]
        selection_label,
        #[strong]
        session,
        #[strong]
        syncing,
        async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if buffer_text(&buffer) != &*snapshot.text {
                    syncing.set(true);
                    buffer.set_text(&snapshot.text);
                    syncing.set(false);
                    tracing::debug!(version = snapshot.version, "Editor synced from session");
                }
                if session.borrow().selection().is_none() {
                    selection_label.set_text("No selection");
                }
                refresh_highlight(&buffer, &session);
            }
        }
    ));

    buffer.connect_changed(glib::clone!(
        #[strong]
        session,
        #[strong]
        syncing,
        move |buf| {
            if syncing.get() {
                return;
            }
            let text = buffer_text(buf);
            session.borrow_mut().edit_document(text);
        }
    ));

    buffer.connect_mark_set(glib::clone!(
        #[strong]
        session,
        #[strong]
        syncing,
        #[weak]
        selection_label,
        move |buf, _, mark| {
            if syncing.get() {
                return;
            }
            let name = mark.name();
            if !matches!(name.as_deref(), Some("insert") | Some("selection_bound")) {
                return;
            }
            let anchor = buf.iter_at_mark(&buf.selection_bound()).offset() as usize;
            let head = buf.iter_at_mark(&buf.get_insert()).offset() as usize;
            let summary = match session.borrow_mut().select(anchor, head) {
                Some(selection) => format!("Selected: {} chars", selection.len()),
                None => "No selection".to_string(),
            };
            selection_label.set_text(&summary);
        }
    ));

    let focus = gtk4::EventControllerFocus::new();
    focus.connect_enter(glib::clone!(
        #[strong]
        session,
        #[weak]
        buffer,
        move |_| {
            session.borrow_mut().set_editor_focused(true);
            refresh_highlight(&buffer, &session);
        }
    ));
    focus.connect_leave(glib::clone!(
        #[strong]
        session,
        #[weak]
        buffer,
        move |_| {
            session.borrow_mut().set_editor_focused(false);
            refresh_highlight(&buffer, &session);
        }
    ));
    editor_view.add_controller(focus);

    // The highlight is a tag in the editor's own buffer, so it scrolls with
    // the text and never needs `sync_scroll`.

    buffer.connect_cursor_position_notify(glib::clone!(
        #[weak]
        pos_label,
        move |buf| {
            let iter = buf.iter_at_mark(&buf.get_insert());
            let line = iter.line() + 1;
            let col = iter.line_offset() + 1;
            pos_label.set_text(&format!("Line: {}, Col: {}", line, col));
        }
    ));
}
