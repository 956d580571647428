pub mod chat_view;
pub mod main_window;
pub mod setup;
pub mod sidebar;

use adw::Application;
use glib::MainContext;
use once_cell::sync::Lazy;
use school_messenger::app::AppState;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn spawn_async<F>(fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    RUNTIME.spawn(fut);
}

pub fn glib_channel<T: Send + 'static>() -> (glib::Sender<T>, glib::Receiver<T>) {
    MainContext::channel(glib::Priority::default())
}

/// Run `fut` on the tokio runtime and deliver its output on the GTK main loop.
pub fn run_async_to_main<T, Fut>(fut: Fut) -> glib::Receiver<T>
where
    T: Send + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
{
    let (tx, rx) = glib_channel::<T>();
    spawn_async(async move {
        let res = fut.await;
        let _ = tx.send(res);
    });
    rx
}

pub fn build_ui(app: &Application) {
    let state = AppState::load();
    if state.is_configured() {
        main_window::show_main_window(app, state);
    } else {
        setup::show_setup_window(app);
    }
}
