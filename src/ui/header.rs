use crate::constants::APP_NAME;
use adw::{HeaderBar, WindowTitle};
use gtk4::prelude::{BoxExt, WidgetExt};
use gtk4::{Box, Button, Orientation};

/// Creates the application header bar containing file operations, copy and settings.
pub fn create_header_bar() -> (HeaderBar, WindowTitle, Button, Button, Button, Button, Button) {
    let header_bar = HeaderBar::new();
    let view_title = WindowTitle::new(APP_NAME, "");
    header_bar.set_title_widget(Some(&view_title));

    let left_box = Box::new(Orientation::Horizontal, 0);
    left_box.add_css_class("linked");

    let new_btn = Button::builder()
        .icon_name("document-new-symbolic")
        .tooltip_text("New Presentation")
        .build();
    let open_btn = Button::builder()
        .icon_name("document-open-symbolic")
        .tooltip_text("Open File")
        .build();
    let save_btn = Button::builder()
        .icon_name("document-save-symbolic")
        .tooltip_text("Save File")
        .build();

    left_box.append(&new_btn);
    left_box.append(&open_btn);
    left_box.append(&save_btn);
    header_bar.pack_start(&left_box);

    let settings_btn = Button::builder()
        .icon_name("emblem-system-symbolic")
        .tooltip_text("Settings")
        .build();
    let copy_btn = Button::builder()
        .icon_name("edit-copy-symbolic")
        .tooltip_text("Copy LaTeX to Clipboard")
        .build();

    header_bar.pack_end(&settings_btn);
    header_bar.pack_end(&copy_btn);

    (
        header_bar,
        view_title,
        new_btn,
        open_btn,
        save_btn,
        copy_btn,
        settings_btn,
    )
}
