use adw::prelude::*;
use adw::Application;
use std::cell::RefCell;
use std::rc::Rc;

use school_messenger::app::AppState;
use school_messenger::chat::realtime::ChannelHandle;
use school_messenger::{ConversationView, Messenger, Store};

fn show_error_window(app: &Application, title: &str, description: &str) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("School Messenger")
        .default_width(640)
        .default_height(420)
        .build();
    let page = adw::StatusPage::builder()
        .icon_name("dialog-error-symbolic")
        .title(title)
        .description(description)
        .build();
    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    container.append(&adw::HeaderBar::new());
    container.append(&page);
    window.set_content(Some(&container));
    window.present();
}

pub fn show_main_window(app: &Application, state: AppState) {
    let Some(profile) = state.profile.clone() else {
        crate::ui::setup::show_setup_window(app);
        return;
    };
    let role = profile.role;

    let api = match state.api_client() {
        Ok(api) => api,
        Err(e) => {
            show_error_window(app, "Cannot reach the portal", &e.to_string());
            return;
        }
    };
    let store = Store::new();
    let messenger = match Messenger::new(api, store.clone(), role, profile) {
        Ok(m) => m,
        Err(e) => {
            show_error_window(app, "Cannot load messages", &e.to_string());
            return;
        }
    };

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("School Messenger")
        .default_width(960)
        .default_height(640)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Rc::new(crate::ui::sidebar::Sidebar::new("Contacts"));
    split.set_flap(Some(&sidebar.widget()));

    let chat = crate::ui::chat_view::ChatView::new(ConversationView::new(messenger.clone()), overlay.clone());
    split.set_content(Some(&chat.widget()));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some(&format!("School Messenger · {}", messenger.identity())));
    header.set_title_widget(Some(&title));

    let sign_out_btn = gtk4::Button::with_label("Sign out");
    header.pack_end(&sign_out_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    {
        let store = store.clone();
        let chat = chat.clone();
        sidebar.connect_selected(move |id| {
            let name = store
                .contacts_by_role(role)
                .into_iter()
                .find(|c| c.id == id)
                .map(|c| c.name)
                .unwrap_or_else(|| id.clone());
            chat.select(id, &name);
        });
    }

    // Re-render whenever the store changes, whichever task changed it.
    // Breaking here drops the receiver, which ends the forwarding task.
    {
        let (tx, rx) = crate::ui::glib_channel::<()>();
        crate::ui::spawn_async(store.forward_changes(move |_| tx.send(()).is_ok()));
        let store = store.clone();
        let sidebar = sidebar.clone();
        let chat = chat.clone();
        let window = window.downgrade();
        rx.attach(None, move |()| {
            if !window.upgrade().is_some_and(|w| w.is_visible()) {
                return glib::ControlFlow::Break;
            }
            sidebar.set_items(&store.contacts_by_role(role));
            chat.refresh();
            glib::ControlFlow::Continue
        });
    }

    let channel: Rc<RefCell<Option<ChannelHandle>>> = Rc::new(RefCell::new(None));
    {
        let realtime = state.realtime_config();
        let messenger = messenger.clone();
        let rx = crate::ui::run_async_to_main(async move {
            if messenger.load_contacts().await.is_none() {
                log::warn!("contact directory unavailable");
            }
            messenger.load_history().await;
            match realtime {
                Ok(config) => Some(messenger.open_channel(config)),
                Err(e) => {
                    log::error!("realtime updates disabled: {e}");
                    None
                }
            }
        });
        let channel = channel.clone();
        let overlay = overlay.clone();
        rx.attach(None, move |handle| {
            if handle.is_none() {
                overlay.add_toast(adw::Toast::new("Live updates are unavailable."));
            }
            *channel.borrow_mut() = handle;
            glib::ControlFlow::Break
        });
    }

    {
        let channel = channel.clone();
        window.connect_close_request(move |_| {
            // Dropping the handle disconnects the socket.
            channel.borrow_mut().take();
            glib::Propagation::Proceed
        });
    }

    {
        let app = app.clone();
        let window = window.clone();
        sign_out_btn.connect_clicked(move |_| {
            let mut st = AppState::load();
            st.profile = None;
            if let Err(e) = st.save() {
                log::error!("failed to clear profile: {e}");
            }
            channel.borrow_mut().take();
            crate::ui::setup::show_setup_window(&app);
            window.close();
        });
    }
}
