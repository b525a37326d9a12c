use gtk4::prelude::*;
use gtk4::{Box, Button, Entry, Label, Orientation, Spinner};

/// Widgets of the right-hand action panel.
#[derive(Clone)]
pub struct ActionPanel {
    pub container: Box,
    pub banner: adw::Banner,
    pub stack: adw::ViewStack,
    pub instruction_entry: Entry,
    pub update_btn: Button,
    pub modify_btn: Button,
    pub image: MediaControls,
    pub pdf: MediaControls,
    pub spinner: Spinner,
    pub busy_label: Label,
    pub cancel_btn: Button,
}

/// Attach / clear / prompt / run controls for one media flow.
#[derive(Clone)]
pub struct MediaControls {
    /// The whole page; files dropped anywhere on it are attached.
    pub page: Box,
    pub choose_btn: Button,
    /// Image flow only.
    pub paste_btn: Option<Button>,
    pub clear_btn: Button,
    pub file_label: Label,
    pub prompt_entry: Entry,
    pub run_btn: Button,
}

impl MediaControls {
    fn new(choose: &str, paste: bool, placeholder: &str, run: &str, empty: &str) -> Self {
        let page = page_box();

        let row = Box::new(Orientation::Horizontal, 6);
        let choose_btn = Button::builder().label(choose).build();
        let paste_btn = paste.then(|| {
            Button::builder()
                .icon_name("edit-paste-symbolic")
                .tooltip_text("Paste image from clipboard")
                .build()
        });
        let clear_btn = Button::builder()
            .icon_name("edit-clear-symbolic")
            .tooltip_text("Remove attachment")
            .sensitive(false)
            .build();
        let file_label = Label::builder()
            .label(empty)
            .xalign(0.0)
            .hexpand(true)
            .ellipsize(gtk4::pango::EllipsizeMode::Middle)
            .build();
        file_label.add_css_class("dim-label");
        row.append(&choose_btn);
        if let Some(btn) = &paste_btn {
            row.append(btn);
        }
        row.append(&file_label);
        row.append(&clear_btn);

        let prompt_entry = Entry::builder().placeholder_text(placeholder).build();
        let run_btn = Button::builder().label(run).build();
        run_btn.add_css_class("suggested-action");

        page.append(&row);
        page.append(&prompt_entry);
        page.append(&run_btn);

        let hint = Label::builder()
            .label("Or drop a file here.")
            .xalign(0.0)
            .build();
        hint.add_css_class("dim-label");
        page.append(&hint);

        Self {
            page,
            choose_btn,
            paste_btn,
            clear_btn,
            file_label,
            prompt_entry,
            run_btn,
        }
    }
}

fn page_box() -> Box {
    let page = Box::new(Orientation::Vertical, 8);
    page.set_margin_start(12);
    page.set_margin_end(12);
    page.set_margin_top(12);
    page.set_margin_bottom(12);
    page
}

pub const NO_IMAGE: &str = "No image selected";
pub const NO_PDF: &str = "No PDF selected";

/// Creates the action panel: a switcher between prompt, image and PDF input,
/// plus the shared busy indicator and cancel button.
pub fn create_action_panel() -> ActionPanel {
    let container = Box::new(Orientation::Vertical, 0);
    container.set_width_request(320);

    let banner = adw::Banner::builder().revealed(false).build();
    container.append(&banner);

    let stack = adw::ViewStack::new();
    let switcher = adw::ViewSwitcher::builder()
        .stack(&stack)
        .policy(adw::ViewSwitcherPolicy::Wide)
        .build();
    switcher.set_margin_top(6);
    container.append(&switcher);

    // Prompt page
    let prompt_page = page_box();
    let instruction_entry = Entry::builder()
        .placeholder_text("Describe the change (e.g. 'Add a frame on Pythagoras theorem')...")
        .hexpand(true)
        .build();
    let update_btn = Button::builder()
        .label("Update Presentation")
        .tooltip_text("Apply the instruction to the whole document")
        .build();
    update_btn.add_css_class("suggested-action");
    let modify_btn = Button::builder()
        .label("Modify Selection")
        .tooltip_text("Apply the instruction to the selected text only")
        .build();
    let hint = Label::builder()
        .label("Select text in the editor to rewrite just that part.")
        .wrap(true)
        .xalign(0.0)
        .build();
    hint.add_css_class("dim-label");
    prompt_page.append(&instruction_entry);
    prompt_page.append(&update_btn);
    prompt_page.append(&modify_btn);
    prompt_page.append(&hint);
    stack.add_titled_with_icon(&prompt_page, Some("prompt"), "Prompt", "document-edit-symbolic");

    let image = MediaControls::new(
        "Choose Image",
        true,
        "Optional: what should the slides say about this image?",
        "Generate from Image",
        NO_IMAGE,
    );
    stack.add_titled_with_icon(&image.page, Some("image"), "Image", "image-x-generic-symbolic");

    let pdf = MediaControls::new(
        "Choose PDF",
        false,
        "Optional: which parts of the PDF to turn into slides?",
        "Generate from PDF",
        NO_PDF,
    );
    stack.add_titled_with_icon(&pdf.page, Some("pdf"), "PDF", "x-office-document-symbolic");

    stack.set_vexpand(true);
    container.append(&stack);

    // Busy row
    let busy_box = Box::new(Orientation::Horizontal, 6);
    busy_box.set_margin_start(12);
    busy_box.set_margin_end(12);
    busy_box.set_margin_bottom(12);
    let spinner = Spinner::new();
    let busy_label = Label::builder().xalign(0.0).hexpand(true).build();
    busy_label.add_css_class("dim-label");
    let cancel_btn = Button::builder()
        .label("Cancel")
        .visible(false)
        .build();
    cancel_btn.add_css_class("destructive-action");
    busy_box.append(&spinner);
    busy_box.append(&busy_label);
    busy_box.append(&cancel_btn);
    container.append(&busy_box);

    ActionPanel {
        container,
        banner,
        stack,
        instruction_entry,
        update_btn,
        modify_btn,
        image,
        pdf,
        spinner,
        busy_label,
        cancel_btn,
    }
}
