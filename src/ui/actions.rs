use crate::action::{ActionKind, InputMethod};
use crate::constants::API_KEY_MISSING_MARKER;
use crate::media::{MediaAttachment, MediaKind};
use crate::session::{load_attachment, store_attachment, AbandonGuard, ActionError, EditSession};
use crate::state::AppState;
use crate::ui::panel::{ActionPanel, MediaControls, NO_IMAGE, NO_PDF};
use adw::prelude::*;
use adw::{ApplicationWindow, ToastOverlay};
use gtk4::{gdk, Button, Label};
use sourceview5::View;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Everything an action handler touches on screen.
#[derive(Clone)]
pub struct ActionWidgets {
    pub panel: ActionPanel,
    pub editor_view: View,
    pub toast_overlay: ToastOverlay,
}

impl ActionWidgets {
    fn triggers(&self) -> Vec<&Button> {
        let mut buttons = vec![&self.panel.update_btn, &self.panel.modify_btn];
        for controls in [&self.panel.image, &self.panel.pdf] {
            buttons.extend([&controls.choose_btn, &controls.clear_btn, &controls.run_btn]);
            buttons.extend(controls.paste_btn.as_ref());
        }
        buttons
    }

    fn set_busy(&self, busy: Option<ActionKind>) {
        let is_busy = busy.is_some();
        for btn in self.triggers() {
            btn.set_sensitive(!is_busy);
        }
        self.editor_view.set_editable(!is_busy);
        self.panel.cancel_btn.set_visible(is_busy);
        if is_busy {
            self.panel.spinner.start();
        } else {
            self.panel.spinner.stop();
        }
        let label = match busy {
            Some(ActionKind::WholeDocumentUpdate) => "Updating presentation...",
            Some(ActionKind::SelectionRewrite) => "Modifying selection...",
            Some(ActionKind::ImageGeneration) => "Generating from image...",
            Some(ActionKind::PdfGeneration) => "Generating from PDF...",
            None => "",
        };
        self.panel.busy_label.set_text(label);
    }

    /// Mirrors the session's input fields into the panel.
    fn sync_inputs(&self, session: &RefCell<EditSession>) {
        let (instruction, image_prompt, pdf_prompt, image_name, pdf_name) = {
            let s = session.borrow();
            let name = |kind| {
                s.attachment(kind)
                    .map(|a| a.file_name.clone().unwrap_or_else(|| "Pasted data".to_string()))
            };
            (
                s.instruction().to_string(),
                s.media_prompt(MediaKind::Image).to_string(),
                s.media_prompt(MediaKind::Pdf).to_string(),
                name(MediaKind::Image),
                name(MediaKind::Pdf),
            )
        };

        set_entry(&self.panel.instruction_entry, &instruction);
        sync_media(&self.panel.image, &image_prompt, image_name.as_deref(), NO_IMAGE);
        sync_media(&self.panel.pdf, &pdf_prompt, pdf_name.as_deref(), NO_PDF);
    }

    fn after_attach(&self, session: &RefCell<EditSession>, result: Result<(), ActionError>) {
        self.sync_inputs(session);
        match result {
            Ok(()) | Err(ActionError::Busy(_)) => {}
            Err(_) => self.show_error(session),
        }
    }

    /// Shows the session's current error: a banner for setup problems
    /// (missing credential, unusable provider), a toast otherwise.
    fn show_error(&self, session: &RefCell<EditSession>) {
        let Some(message) = session.borrow().error().map(str::to_string) else {
            return;
        };
        if let Some(rest) = message.strip_prefix(API_KEY_MISSING_MARKER) {
            self.panel.banner.set_title(rest.trim());
            self.panel.banner.set_revealed(true);
        } else {
            let toast = adw::Toast::new(&message);
            toast.set_timeout(8);
            self.toast_overlay.add_toast(toast);
        }
    }
}

fn set_entry(entry: &gtk4::Entry, text: &str) {
    if entry.text().as_str() != text {
        entry.set_text(text);
    }
}

fn sync_media(controls: &MediaControls, prompt: &str, file_name: Option<&str>, empty: &str) {
    set_entry(&controls.prompt_entry, prompt);
    controls.file_label.set_text(file_name.unwrap_or(empty));
    controls.clear_btn.set_sensitive(file_name.is_some());
}

/// Starts `kind` unless the session refuses it, and settles it when the model answers.
fn trigger(kind: ActionKind, state: &Rc<RefCell<AppState>>, widgets: &ActionWidgets) {
    let (session, client) = {
        let s = state.borrow();
        (s.session.clone(), s.client.clone())
    };

    let begun = session.borrow_mut().begin(kind);
    let pending = match begun {
        Ok(pending) => pending,
        Err(ActionError::Busy(_)) => return,
        Err(_) => {
            widgets.show_error(&session);
            return;
        }
    };

    widgets.panel.banner.set_revealed(false);
    widgets.set_busy(Some(kind));

    let widgets = widgets.clone();
    glib::MainContext::default().spawn_local(async move {
        let guard = AbandonGuard::new(&session);
        let outcome = pending.run(&client).await;
        guard.disarm();
        let settled = session.borrow_mut().settle(pending, outcome);

        widgets.set_busy(None);
        widgets.sync_inputs(&session);
        match settled {
            Ok(()) => {
                let done = match kind {
                    ActionKind::SelectionRewrite => "Selection updated",
                    _ => "Presentation updated",
                };
                widgets.toast_overlay.add_toast(adw::Toast::new(done));
            }
            Err(_) => widgets.show_error(&session),
        }
    });
}

fn choose_media(
    kind: MediaKind,
    window: &ApplicationWindow,
    state: &Rc<RefCell<AppState>>,
    widgets: &ActionWidgets,
) {
    let filter = gtk4::FileFilter::new();
    match kind {
        MediaKind::Image => {
            filter.set_name(Some("Images"));
            filter.add_mime_type("image/*");
        }
        MediaKind::Pdf => {
            filter.set_name(Some("PDF documents"));
            filter.add_mime_type("application/pdf");
        }
    }
    let dialog = gtk4::FileDialog::builder()
        .title(match kind {
            MediaKind::Image => "Choose Image",
            MediaKind::Pdf => "Choose PDF",
        })
        .default_filter(&filter)
        .modal(true)
        .build();

    let session = state.borrow().session.clone();
    let widgets = widgets.clone();
    dialog.open(
        Some(window),
        None::<&gio::Cancellable>,
        move |res| {
            if let Some(path) = res.ok().and_then(|file| file.path()) {
                spawn_load(session, widgets, path, kind);
            }
        },
    );
}

fn spawn_load(
    session: Rc<RefCell<EditSession>>,
    widgets: ActionWidgets,
    path: PathBuf,
    kind: MediaKind,
) {
    glib::MainContext::default().spawn_local(async move {
        let loaded = load_attachment(&session, &path, kind).await;
        widgets.after_attach(&session, loaded);
    });
}

/// Attaches whatever is dropped on a media page, provided it is a local file.
fn accept_drops(kind: MediaKind, session: &Rc<RefCell<EditSession>>, widgets: &ActionWidgets) {
    let controls = match kind {
        MediaKind::Image => &widgets.panel.image,
        MediaKind::Pdf => &widgets.panel.pdf,
    };
    let target = gtk4::DropTarget::new(gio::File::static_type(), gdk::DragAction::COPY);
    target.connect_drop(glib::clone!(
        #[strong]
        session,
        #[strong]
        widgets,
        move |_, value, _, _| {
            let Some(path) = value.get::<gio::File>().ok().and_then(|file| file.path()) else {
                return false;
            };
            if session.borrow().is_busy() {
                return false;
            }
            spawn_load(session.clone(), widgets.clone(), path, kind);
            true
        }
    ));
    controls.page.add_controller(target);
}

/// Reads an image from the clipboard: a texture if there is one, otherwise
/// text holding an image `data:` URI.
fn paste_image(session: Rc<RefCell<EditSession>>, widgets: ActionWidgets) {
    if session.borrow().is_busy() {
        return;
    }
    let clipboard = widgets.panel.image.page.clipboard();
    glib::MainContext::default().spawn_local(async move {
        let pasted = match clipboard.read_texture_future().await {
            Ok(Some(texture)) => Some(MediaAttachment::from_bytes(
                MediaKind::Image,
                &texture.save_to_png_bytes(),
                "image/png",
                None,
            )),
            _ => match clipboard.read_text_future().await {
                Ok(Some(text)) => MediaAttachment::from_pasted_text(text.trim()),
                _ => None,
            },
        };
        match pasted {
            Some(pasted) => {
                let stored = store_attachment(&session, pasted);
                widgets.after_attach(&session, stored);
            }
            None => {
                session
                    .borrow_mut()
                    .report_error("The clipboard does not contain an image.");
                widgets.show_error(&session);
            }
        }
    });
}

/// Connects the action panel: input mirroring, the four triggers, media
/// pickers, cancel and copy.
pub fn connect_actions(
    window: &ApplicationWindow,
    state: Rc<RefCell<AppState>>,
    widgets: &ActionWidgets,
    copy_btn: &Button,
) {
    let session = state.borrow().session.clone();
    let panel = &widgets.panel;

    panel.instruction_entry.connect_changed(glib::clone!(
        #[strong]
        session,
        move |entry| {
            session.borrow_mut().set_instruction(entry.text().as_str());
        }
    ));
    for (controls, kind) in [(&panel.image, MediaKind::Image), (&panel.pdf, MediaKind::Pdf)] {
        controls.prompt_entry.connect_changed(glib::clone!(
            #[strong]
            session,
            move |entry| {
                session
                    .borrow_mut()
                    .set_media_prompt(kind, entry.text().as_str());
            }
        ));
        controls.clear_btn.connect_clicked(glib::clone!(
            #[strong]
            session,
            #[strong]
            widgets,
            move |_| {
                session.borrow_mut().clear_media(kind);
                widgets.sync_inputs(&session);
            }
        ));
        controls.choose_btn.connect_clicked(glib::clone!(
            #[weak]
            window,
            #[strong]
            state,
            #[strong]
            widgets,
            move |_| choose_media(kind, &window, &state, &widgets)
        ));
        if let Some(paste_btn) = &controls.paste_btn {
            paste_btn.connect_clicked(glib::clone!(
                #[strong]
                session,
                #[strong]
                widgets,
                move |_| paste_image(session.clone(), widgets.clone())
            ));
        }
        accept_drops(kind, &session, widgets);
    }

    panel.stack.connect_visible_child_name_notify(glib::clone!(
        #[strong]
        session,
        move |stack| {
            let method = match stack.visible_child_name().as_deref() {
                Some("image") => InputMethod::Image,
                Some("pdf") => InputMethod::Pdf,
                _ => InputMethod::Prompt,
            };
            session.borrow_mut().set_input_method(method);
        }
    ));

    let triggers = [
        (&panel.update_btn, ActionKind::WholeDocumentUpdate),
        (&panel.modify_btn, ActionKind::SelectionRewrite),
        (&panel.image.run_btn, ActionKind::ImageGeneration),
        (&panel.pdf.run_btn, ActionKind::PdfGeneration),
    ];
    for (btn, kind) in triggers {
        btn.connect_clicked(glib::clone!(
            #[strong]
            state,
            #[strong]
            widgets,
            move |_| trigger(kind, &state, &widgets)
        ));
    }
    panel.instruction_entry.connect_activate(glib::clone!(
        #[strong]
        state,
        #[strong]
        widgets,
        move |_| trigger(ActionKind::WholeDocumentUpdate, &state, &widgets)
    ));

    panel.cancel_btn.connect_clicked(glib::clone!(
        #[strong]
        session,
        move |_| {
            session.borrow().cancel_active();
        }
    ));

    panel.banner.set_button_label(Some("Dismiss"));
    panel.banner.connect_button_clicked(|banner| banner.set_revealed(false));

    let toast_overlay = widgets.toast_overlay.clone();
    copy_btn.connect_clicked(glib::clone!(
        #[strong]
        session,
        #[weak]
        toast_overlay,
        move |btn| {
            let text = session.borrow().document().to_string();
            btn.clipboard().set_text(&text);
            toast_overlay.add_toast(adw::Toast::new("LaTeX copied to clipboard"));
        }
    ));

    widgets.sync_inputs(&session);
}

/// Probes the active provider and reports the result in the status bar.
pub fn check_provider(state: &Rc<RefCell<AppState>>, ai_status_label: &Label, widgets: &ActionWidgets) {
    let client = state.borrow().client.clone();
    ai_status_label.set_text(&format!("AI: Checking {}...", client.provider_name()));

    glib::MainContext::default().spawn_local(glib::clone!(
        #[weak]
        ai_status_label,
        #[strong]
        widgets,
        async move {
            match client.check_availability().await {
                Ok(()) => {
                    widgets.panel.banner.set_revealed(false);
                    ai_status_label.set_text(&format!(
                        "AI: {} ({})",
                        client.provider_name(),
                        client.model()
                    ));
                    tracing::info!(
                        "AI Assistant initialized with {} ({})",
                        client.provider_name(),
                        client.model()
                    );
                }
                Err(e) => {
                    ai_status_label.set_text(&format!("AI: {} unavailable", client.provider_name()));
                    tracing::warn!("AI provider check failed: {}", e);
                    if e.is_configuration_missing() {
                        widgets.panel.banner.set_title(
                            e.to_string().trim_start_matches(API_KEY_MISSING_MARKER).trim(),
                        );
                        widgets.panel.banner.set_revealed(true);
                    }
                }
            }
        }
    ));
}
