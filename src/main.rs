mod ui;

use adw::prelude::*;
use adw::Application;

fn main() {
    school_messenger::utils::init_logging();
    let app = Application::builder()
        .application_id("org.school.Messenger")
        .build();
    app.connect_activate(|app| {
        crate::ui::build_ui(app);
    });
    app.run();
}
