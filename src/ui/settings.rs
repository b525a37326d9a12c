use crate::api::create_provider;
use crate::generation::GenerationClient;
use crate::state::AppState;
use adw::prelude::*;
use adw::{ActionRow, PreferencesGroup, PreferencesPage, PreferencesWindow};
use gtk4::{DropDown, Entry, StringList};
use std::cell::RefCell;
use std::rc::Rc;

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Shows the provider settings. Changes are saved and a new client is built
/// when the window closes; `on_settings_closed` runs afterwards.
pub fn show_settings(
    parent: &gtk4::Window,
    state: Rc<RefCell<AppState>>,
    on_settings_closed: Option<Rc<dyn Fn()>>,
) {
    let window = PreferencesWindow::builder()
        .transient_for(parent)
        .modal(true)
        .title("Settings")
        .default_width(520)
        .build();

    let page_ai = PreferencesPage::new();
    page_ai.set_title("AI Configuration");
    page_ai.set_icon_name(Some("starred-symbolic"));
    window.add(&page_ai);

    let group = PreferencesGroup::new();
    group.set_title("Provider Settings");
    group.set_description(Some(
        "API keys are read from environment variables; only the variable name is stored.",
    ));
    page_ai.add(&group);

    let config = state.borrow().config.clone();
    let provider_names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
    let names = StringList::new(&provider_names);

    let provider_row = ActionRow::builder()
        .title("Active Provider")
        .subtitle("Select which AI service to use")
        .build();
    let provider_dropdown = DropDown::builder()
        .model(&names)
        .valign(gtk4::Align::Center)
        .build();
    let current_index = config
        .providers
        .iter()
        .position(|p| p.name == config.active_provider)
        .unwrap_or(0);
    provider_dropdown.set_selected(current_index as u32);
    provider_row.add_suffix(&provider_dropdown);
    group.add(&provider_row);

    let entry_row = |title: &str, subtitle: &str, placeholder: &str| {
        let row = ActionRow::builder().title(title).subtitle(subtitle).build();
        let entry = Entry::builder()
            .valign(gtk4::Align::Center)
            .hexpand(true)
            .placeholder_text(placeholder)
            .build();
        row.add_suffix(&entry);
        group.add(&row);
        entry
    };

    let key_env_entry = entry_row(
        "API Key Variable",
        "Environment variable holding the key",
        "e.g. API_KEY",
    );
    let url_entry = entry_row("Base URL", "API endpoint for the provider", "");
    let model_entry = entry_row(
        "Model Name",
        "Specific model ID (e.g. gemini-2.5-flash, gpt-4o)",
        "",
    );
    let prompt_entry = entry_row(
        "Extra System Prompt",
        "Appended to the built-in instructions",
        "Optional: e.g. 'Prefer the Madrid theme'",
    );

    let update_fields = glib::clone!(
        #[weak]
        provider_dropdown,
        #[weak]
        key_env_entry,
        #[weak]
        url_entry,
        #[weak]
        model_entry,
        #[weak]
        prompt_entry,
        #[strong]
        state,
        move || {
            let config = state.borrow().config.clone();
            if let Some(p) = config.providers.get(provider_dropdown.selected() as usize) {
                key_env_entry.set_text(p.api_key_env.as_deref().unwrap_or(""));
                url_entry.set_text(&p.base_url);
                model_entry.set_text(&p.active_model);
                prompt_entry.set_text(p.system_prompt.as_deref().unwrap_or(""));
            }
        }
    );
    let update_fields = Rc::new(update_fields);
    update_fields();

    provider_dropdown.connect_selected_notify(glib::clone!(
        #[strong]
        update_fields,
        move |_| update_fields()
    ));

    window.connect_close_request(glib::clone!(
        #[strong]
        state,
        #[strong]
        provider_dropdown,
        #[strong]
        key_env_entry,
        #[strong]
        url_entry,
        #[strong]
        model_entry,
        #[strong]
        prompt_entry,
        move |_| {
            {
                let mut s = state.borrow_mut();
                let selected = provider_dropdown.selected() as usize;
                if let Some(p) = s.config.providers.get_mut(selected) {
                    p.api_key_env = optional(&key_env_entry.text());
                    p.base_url = url_entry.text().trim().to_string();
                    p.active_model = model_entry.text().trim().to_string();
                    p.system_prompt = optional(&prompt_entry.text());
                    let name = p.name.clone();
                    s.config.active_provider = name;
                }

                if let Err(e) = s.config.save() {
                    tracing::error!("Failed to save config: {:#}", e);
                }

                if let Some(p) = s.config.get_active_provider().cloned() {
                    s.client = GenerationClient::new(create_provider(&p))
                        .with_system_suffix(p.system_prompt.clone());
                    tracing::info!("Switched AI provider to {} ({})", p.name, p.active_model);
                }
            }

            if let Some(on_closed) = &on_settings_closed {
                on_closed();
            }

            glib::Propagation::Proceed
        }
    ));

    window.present();
}
