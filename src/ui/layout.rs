use gtk4::prelude::{BoxExt, WidgetExt};
use gtk4::{Box, Label, Orientation, Paned};

/// Creates the editor/panel split view and the status bar.
pub fn create_main_layout() -> (Paned, Box, Label, Label, Label) {
    let paned = Paned::new(Orientation::Horizontal);
    paned.set_hexpand(true);
    paned.set_vexpand(true);
    paned.set_position(760);
    paned.set_wide_handle(true);

    let status_bar = Box::new(Orientation::Horizontal, 12);
    status_bar.set_margin_start(12);
    status_bar.set_margin_end(12);
    status_bar.set_margin_top(4);
    status_bar.set_margin_bottom(4);
    status_bar.add_css_class("dim-label");

    let pos_label = Label::new(Some("Line: 1, Col: 1"));
    let selection_label = Label::new(Some("No selection"));
    let ai_status_label = Label::new(Some("AI: Checking..."));
    ai_status_label.set_hexpand(true);
    ai_status_label.set_halign(gtk4::Align::End);

    status_bar.append(&pos_label);
    status_bar.append(&selection_label);
    status_bar.append(&ai_status_label);

    (paned, status_bar, pos_label, selection_label, ai_status_label)
}
