use adw::prelude::*;
use adw::{Application, ApplicationWindow, StyleManager};
use beamer_rs::api::create_provider;
use beamer_rs::constants::{APP_ID, APP_NAME, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH};
use beamer_rs::state::AppState;
use beamer_rs::template::INITIAL_DOCUMENT;
use beamer_rs::ui::actions::{check_provider, connect_actions, ActionWidgets};
use beamer_rs::ui::{editor, file_ops, header, layout, panel, settings};
use beamer_rs::{AppConfig, GenerationClient};
use gtk4::{glib, Orientation};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> glib::ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beamer_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app = Application::builder().application_id(APP_ID).build();
    app.connect_activate(build_ui);
    app.run()
}

fn build_ui(app: &Application) {
    let config = AppConfig::load();
    let provider = config
        .get_active_provider()
        .or_else(|| config.providers.first())
        .cloned();
    let client = match provider {
        Some(p) => GenerationClient::new(create_provider(&p)).with_system_suffix(p.system_prompt),
        None => {
            tracing::warn!("No AI provider configured; falling back to defaults");
            let default = AppConfig::default();
            let p = &default.providers[0];
            GenerationClient::new(create_provider(p))
        }
    };
    let state = Rc::new(RefCell::new(AppState::new(config, client, INITIAL_DOCUMENT)));

    let window = ApplicationWindow::builder()
        .application(app)
        .default_width(DEFAULT_WINDOW_WIDTH)
        .default_height(DEFAULT_WINDOW_HEIGHT)
        .title(APP_NAME)
        .build();

    let toast_overlay = adw::ToastOverlay::new();
    window.set_content(Some(&toast_overlay));

    let content_box = gtk4::Box::new(Orientation::Vertical, 0);
    toast_overlay.set_child(Some(&content_box));

    let (header_bar, view_title, new_btn, open_btn, save_btn, copy_btn, settings_btn) =
        header::create_header_bar();
    content_box.append(&header_bar);

    let (paned, status_bar, pos_label, selection_label, ai_status_label) =
        layout::create_main_layout();
    content_box.append(&paned);
    content_box.append(&status_bar);

    let (buffer, editor_view, editor_scroll) = editor::create_editor(&StyleManager::default());
    paned.set_start_child(Some(&editor_scroll));

    let action_panel = panel::create_action_panel();
    paned.set_end_child(Some(&action_panel.container));

    editor::bind_session(
        &buffer,
        &editor_view,
        state.clone(),
        &pos_label,
        &selection_label,
    );

    let widgets = ActionWidgets {
        panel: action_panel,
        editor_view: editor_view.clone(),
        toast_overlay: toast_overlay.clone(),
    };
    connect_actions(&window, state.clone(), &widgets, &copy_btn);
    file_ops::connect_file_operations(
        &new_btn,
        &open_btn,
        &save_btn,
        &window,
        state.clone(),
        &view_title,
        &toast_overlay,
    );

    settings_btn.connect_clicked(glib::clone!(
        #[weak]
        window,
        #[strong]
        state,
        #[strong]
        widgets,
        #[weak]
        ai_status_label,
        move |_| {
            let on_closed: Rc<dyn Fn()> = Rc::new(glib::clone!(
                #[strong]
                state,
                #[strong]
                widgets,
                #[weak]
                ai_status_label,
                move || check_provider(&state, &ai_status_label, &widgets)
            ));
            settings::show_settings(window.upcast_ref(), state.clone(), Some(on_closed));
        }
    ));

    check_provider(&state, &ai_status_label, &widgets);
    editor_view.grab_focus();
    window.present();
}
