use crate::state::AppState;
use crate::template::INITIAL_DOCUMENT;
use crate::utils::{open_file, save_file};
use adw::prelude::*;
use adw::{ApplicationWindow, ToastOverlay, WindowTitle};
use gtk4::Button;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

fn refuse_while_busy(state: &Rc<RefCell<AppState>>, toast_overlay: &ToastOverlay) -> bool {
    let busy = state.borrow().session.borrow().is_busy();
    if busy {
        toast_overlay.add_toast(adw::Toast::new(
            "Wait for the current AI action to finish first.",
        ));
    }
    busy
}

fn write_document(
    path: &Path,
    state: &Rc<RefCell<AppState>>,
    view_title: &WindowTitle,
    toast_overlay: &ToastOverlay,
) {
    let text = state.borrow().session.borrow().document().to_string();
    match save_file(path, &text) {
        Ok(()) => {
            state.borrow_mut().current_file = Some(path.to_path_buf());
            view_title.set_subtitle(&path.to_string_lossy());
            tracing::info!("Saved {:?}", path);
        }
        Err(e) => {
            tracing::error!("Failed to save: {:#}", e);
            toast_overlay.add_toast(adw::Toast::new(&format!("Failed to save: {}", e)));
        }
    }
}

#[allow(clippy::too_many_arguments)]
/// Connects the standard file operations (New, Open, Save). All of them go
/// through the session; the editor follows via its document subscription.
pub fn connect_file_operations(
    new_btn: &Button,
    open_btn: &Button,
    save_btn: &Button,
    window: &ApplicationWindow,
    state: Rc<RefCell<AppState>>,
    view_title: &WindowTitle,
    toast_overlay: &ToastOverlay,
) {
    new_btn.connect_clicked(glib::clone!(
        #[strong]
        state,
        #[weak]
        view_title,
        #[weak]
        toast_overlay,
        move |_| {
            if refuse_while_busy(&state, &toast_overlay) {
                return;
            }
            let session = state.borrow().session.clone();
            session.borrow_mut().edit_document(INITIAL_DOCUMENT);
            state.borrow_mut().current_file = None;
            view_title.set_subtitle("");
        }
    ));

    open_btn.connect_clicked(glib::clone!(
        #[weak]
        window,
        #[strong]
        state,
        #[weak]
        view_title,
        #[weak]
        toast_overlay,
        move |_| {
            if refuse_while_busy(&state, &toast_overlay) {
                return;
            }
            let filter = gtk4::FileFilter::new();
            filter.set_name(Some("LaTeX sources"));
            filter.add_pattern("*.tex");
            let dialog = gtk4::FileDialog::builder()
                .title("Open File")
                .default_filter(&filter)
                .build();

            dialog.open(
                Some(&window),
                None::<&gio::Cancellable>,
                glib::clone!(
                    #[strong]
                    state,
                    #[weak]
                    view_title,
                    #[weak]
                    toast_overlay,
                    move |res| {
                        let Some(path) = res.ok().and_then(|file| file.path()) else {
                            return;
                        };
                        match open_file(&path) {
                            Ok(content) => {
                                let session = state.borrow().session.clone();
                                session.borrow_mut().edit_document(content);
                                state.borrow_mut().current_file = Some(path.clone());
                                view_title.set_subtitle(&path.to_string_lossy());
                            }
                            Err(e) => {
                                tracing::error!("Failed to open: {:#}", e);
                                toast_overlay
                                    .add_toast(adw::Toast::new(&format!("Failed to open: {}", e)));
                            }
                        }
                    }
                ),
            );
        }
    ));

    save_btn.connect_clicked(glib::clone!(
        #[weak]
        window,
        #[strong]
        state,
        #[weak]
        view_title,
        #[weak]
        toast_overlay,
        move |_| {
            let path_opt = state.borrow().current_file.clone();
            if let Some(path) = path_opt {
                write_document(&path, &state, &view_title, &toast_overlay);
            } else {
                let dialog = gtk4::FileDialog::builder()
                    .title("Save File")
                    .initial_name("presentation.tex")
                    .build();

                dialog.save(
                    Some(&window),
                    None::<&gio::Cancellable>,
                    glib::clone!(
                        #[strong]
                        state,
                        #[weak]
                        view_title,
                        #[weak]
                        toast_overlay,
                        move |res| {
                            if let Some(path) = res.ok().and_then(|file| file.path()) {
                                write_document(&path, &state, &view_title, &toast_overlay);
                            }
                        }
                    ),
                );
            }
        }
    ));
}
