use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;

use school_messenger::Contact;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    ids: Rc<RefCell<Vec<String>>>,
}

impl Sidebar {
    pub fn new(title: &str) -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(240);

        let title = gtk::Label::new(Some(title));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let scroller = gtk::ScrolledWindow::builder().vexpand(true).build();
        let list = gtk::ListBox::new();
        scroller.set_child(Some(&list));
        root.append(&scroller);

        Self { root, list, ids: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn connect_selected<F: Fn(String) + 'static>(&self, f: F) {
        let ids = self.ids.clone();
        self.list.connect_row_selected(move |_, row| {
            let Some(row) = row else { return };
            if let Some(id) = ids.borrow().get(row.index() as usize) {
                f(id.clone());
            }
        });
    }

    pub fn set_items(&self, contacts: &[Contact]) {
        // Rebuilding fires row-selected; keep the id list in sync first.
        *self.ids.borrow_mut() = contacts.iter().map(|c| c.id.clone()).collect();
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        for contact in contacts {
            let row = gtk::ListBoxRow::new();
            let body = gtk::Box::new(gtk::Orientation::Vertical, 2);
            body.set_margin_top(8);
            body.set_margin_bottom(8);
            body.set_margin_start(8);
            body.set_margin_end(8);

            let label = gtk::Label::new(Some(&contact.name));
            label.set_halign(gtk::Align::Start);
            body.append(&label);

            let mut detail = contact.role.to_string();
            if let Some(subjects) = contact.subjects.as_ref().filter(|s| !s.is_empty()) {
                detail = format!("{detail} · {}", subjects.join(", "));
            }
            if let Some(students) = contact.students.as_ref().filter(|s| !s.is_empty()) {
                let names: Vec<_> = students.iter().map(|s| format!("{} ({})", s.name, s.class)).collect();
                detail = format!("{detail} · {}", names.join(", "));
            }
            let sub = gtk::Label::new(Some(&detail));
            sub.add_css_class("dim-label");
            sub.set_halign(gtk::Align::Start);
            body.append(&sub);

            row.set_child(Some(&body));
            self.list.append(&row);
        }
    }
}
