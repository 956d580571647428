use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;

use school_messenger::api::models::{Role, Ward};
use school_messenger::app::AppState;
use school_messenger::chat::identity::{LocalIdentity, Profile};
use school_messenger::ApiClient;

const ROLES: [Role; 4] = [Role::Guardian, Role::Teacher, Role::Director, Role::Admin];

/// "Liya:7A, Abel:5B" -> wards.
fn parse_wards(input: &str) -> Vec<Ward> {
    input
        .split(',')
        .filter_map(|part| {
            let (name, class) = part.split_once(':')?;
            let (name, class) = (name.trim(), class.trim());
            (!name.is_empty() && !class.is_empty()).then(|| Ward { name: name.to_string(), class: class.to_string() })
        })
        .collect()
}

fn non_empty(entry: &gtk::Entry) -> Option<String> {
    let text = entry.text().trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub fn show_setup_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("School Messenger Setup")
        .default_width(440)
        .default_height(360)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Connect to the school portal"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("Server URL (e.g. https://portal.school.edu)"));
    server_entry.set_hexpand(true);

    let role_dropdown = gtk::DropDown::from_strings(&["Guardian", "Teacher", "Director", "Admin"]);

    let username_entry = gtk::Entry::new();
    username_entry.set_placeholder_text(Some("Username"));

    let staff_entry = gtk::Entry::new();
    staff_entry.set_placeholder_text(Some("Global staff ID (staff only)"));

    let wards_entry = gtk::Entry::new();
    wards_entry.set_placeholder_text(Some("Students, e.g. Liya:7A, Abel:5B (guardians only)"));

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&role_dropdown);
    form.append(&username_entry);
    form.append(&staff_entry);
    form.append(&wards_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let connect_btn = gtk::Button::with_label("Connect");
    connect_btn.add_css_class("suggested-action");
    connect_btn.set_halign(gtk::Align::End);
    root.append(&connect_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("School Messenger"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let username_entry = username_entry.clone();
        let staff_entry = staff_entry.clone();
        let wards_entry = wards_entry.clone();
        let role_dropdown = role_dropdown.clone();
        move || {
            let url = school_messenger::utils::normalize_url(&server_entry.text());
            if url.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter the server URL."));
                return;
            }
            let role = ROLES.get(role_dropdown.selected() as usize).copied().unwrap_or(Role::Guardian);
            let profile = Profile {
                role,
                username: non_empty(&username_entry),
                global_staff_id: non_empty(&staff_entry),
                display_name: None,
                students: parse_wards(&wards_entry.text()),
            };
            let identity = match LocalIdentity::resolve(role, &profile) {
                Ok(identity) => identity,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };

            status.set_label("Connecting…");

            let url_for_async = url.clone();
            let rx = crate::ui::run_async_to_main(async move {
                let client = ApiClient::with_timeout(&url_for_async, std::time::Duration::from_secs(5))?;
                client.contacts_general().await.map(|c| c.len())
            });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            rx.attach(None, move |res| {
                match &res {
                    Ok(count) => log::info!("server reachable, {count} contacts visible"),
                    Err(e) => log::warn!("server check failed, saving anyway: {e}"),
                }
                let mut state = AppState::load();
                state.base_url = url.clone();
                state.profile = Some(profile.clone());
                if let Err(e) = state.save() {
                    overlay2.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                    return glib::ControlFlow::Break;
                }
                status_label.set_label(&format!("Signed in as {identity}"));
                crate::ui::main_window::show_main_window(&app2, state);
                window2.close();
                glib::ControlFlow::Break
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        connect_btn.connect_clicked(move |_| (on_connect)());
    }
    for entry in [&server_entry, &username_entry, &staff_entry, &wards_entry] {
        let on_connect = on_connect.clone();
        entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
