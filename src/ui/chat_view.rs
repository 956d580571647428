use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;

use school_messenger::chat::session::{Bubble, ConversationView, Direction, PendingSend};
use school_messenger::error::SendError;
use school_messenger::Thread;

pub struct ChatView {
    root: gtk::Box,
    title: gtk::Label,
    messages_box: gtk::Box,
    scroller: gtk::ScrolledWindow,
    entry: gtk::Entry,
    drafts_label: gtk::Label,
    view: Rc<RefCell<ConversationView>>,
    overlay: adw::ToastOverlay,
}

impl ChatView {
    pub fn new(view: ConversationView, overlay: adw::ToastOverlay) -> Rc<Self> {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        let title = gtk::Label::new(Some("Select a contact"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        let drafts_label = gtk::Label::new(None);
        drafts_label.add_css_class("dim-label");
        drafts_label.set_halign(gtk::Align::Start);
        root.append(&drafts_label);

        // Input row
        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let add_btn = gtk::Button::with_label("Add");
        add_btn.set_tooltip_text(Some("Queue this question and compose another"));
        let send_all_btn = gtk::Button::with_label("Send all");
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&add_btn);
        input_row.append(&send_all_btn);
        input_row.append(&send_btn);
        root.append(&input_row);

        let this = Rc::new(Self {
            root,
            title,
            messages_box,
            scroller,
            entry,
            drafts_label,
            view: Rc::new(RefCell::new(view)),
            overlay,
        });

        {
            let this = this.clone();
            send_btn.connect_clicked(move |_| this.send(false));
        }
        {
            let this2 = this.clone();
            this.entry.connect_activate(move |_| this2.send(false));
        }
        {
            let this = this.clone();
            send_all_btn.connect_clicked(move |_| this.send(true));
        }
        {
            let this = this.clone();
            add_btn.connect_clicked(move |_| {
                let text = this.entry.text().trim().to_string();
                if text.is_empty() {
                    return;
                }
                this.view.borrow_mut().push_draft(text);
                this.entry.set_text("");
                this.refresh_drafts();
            });
        }

        this
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn select(self: &Rc<Self>, counterpart: String, name: &str) {
        self.title.set_label(name);
        self.view.borrow_mut().select(counterpart);
        self.refresh();
    }

    fn refresh_drafts(&self) {
        let view = self.view.borrow();
        let drafts = view.drafts();
        if drafts.is_empty() {
            self.drafts_label.set_label("");
        } else {
            self.drafts_label.set_label(&format!("{} queued: {}", drafts.len(), drafts.join(" | ")));
        }
    }

    /// Rebuild the thread list from the store.
    pub fn refresh(self: &Rc<Self>) {
        while let Some(child) = self.messages_box.first_child() {
            self.messages_box.remove(&child);
        }
        let bubbles = self.view.borrow().bubbles();
        // Store order is newest first; show oldest at the top.
        for bubble in bubbles.into_iter().rev() {
            let widget = self.bubble_widget(bubble);
            self.messages_box.append(&widget);
        }
        let adj = self.scroller.vadjustment();
        adj.set_value(adj.upper());
        self.refresh_drafts();
    }

    fn bubble_widget(self: &Rc<Self>, bubble: Bubble) -> gtk::Widget {
        let Bubble { direction, thread } = bubble;
        let frame = gtk::Box::new(gtk::Orientation::Vertical, 4);
        frame.add_css_class("card");
        frame.set_halign(match direction {
            Direction::Sent => gtk::Align::End,
            Direction::Received => gtk::Align::Start,
        });

        for question in &thread.questions {
            let lbl = gtk::Label::new(Some(question));
            lbl.set_wrap(true);
            lbl.set_halign(gtk::Align::Start);
            frame.append(&lbl);
        }
        for response in thread.responses.iter().flatten() {
            let lbl = gtk::Label::new(Some(&format!("↳ {}", response.answer)));
            lbl.set_wrap(true);
            lbl.add_css_class("dim-label");
            lbl.set_halign(gtk::Align::Start);
            frame.append(&lbl);
        }

        let stamp = thread
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let meta = gtk::Label::new(Some(&format!("{stamp} · {:?}", thread.status)));
        meta.add_css_class("caption");
        meta.set_halign(gtk::Align::End);
        frame.append(&meta);

        if direction == Direction::Received && !thread.has_responses() {
            frame.append(&self.reply_row(&thread));
        }
        frame.upcast()
    }

    fn reply_row(self: &Rc<Self>, thread: &Thread) -> gtk::Widget {
        let row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Answer…"));
        let btn = gtk::Button::with_label("Answer");
        row.append(&entry);
        row.append(&btn);

        let this = self.clone();
        let thread_id = thread.id.clone();
        btn.connect_clicked(move |btn| {
            let answer = entry.text().to_string();
            if answer.trim().is_empty() {
                return;
            }
            btn.set_sensitive(false);
            let messenger = this.view.borrow().messenger().clone();
            let thread_id = thread_id.clone();
            let rx = crate::ui::run_async_to_main(async move { messenger.respond(&thread_id, vec![answer]).await });
            let this = this.clone();
            let btn = btn.clone();
            rx.attach(None, move |res| {
                btn.set_sensitive(true);
                match res {
                    Ok(()) => this.refresh(),
                    Err(e) => this.overlay.add_toast(adw::Toast::new(&format!("Failed to answer: {e}"))),
                }
                glib::ControlFlow::Break
            });
        });
        row.upcast()
    }

    fn send(self: &Rc<Self>, multi: bool) {
        let pending: Result<PendingSend, SendError> = {
            let mut view = self.view.borrow_mut();
            if multi {
                let text = self.entry.text().trim().to_string();
                if !text.is_empty() {
                    view.push_draft(text);
                    self.entry.set_text("");
                }
                view.prepare_multi_send()
            } else {
                view.set_compose(self.entry.text().to_string());
                view.prepare_quick_send()
            }
        };
        let pending = match pending {
            Ok(p) => p,
            Err(SendError::EmptyMessage) | Err(SendError::InFlight) => return,
            Err(e) => {
                self.overlay.add_toast(adw::Toast::new(&e.to_string()));
                return;
            }
        };

        let messenger = self.view.borrow().messenger().clone();
        let for_async = pending.clone();
        let rx = crate::ui::run_async_to_main(async move {
            messenger.send_thread(&for_async.counterpart, for_async.questions).await
        });
        let this = self.clone();
        rx.attach(None, move |res| {
            this.view.borrow_mut().complete_send(&pending, &res);
            match res {
                Ok(_) => {
                    if !pending.is_multi() {
                        this.entry.set_text("");
                    }
                    this.refresh();
                }
                Err(e) => this.overlay.add_toast(adw::Toast::new(&format!("Failed to send: {e}"))),
            }
            glib::ControlFlow::Break
        });
    }
}

