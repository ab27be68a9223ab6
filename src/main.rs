use circlepoll::config::Settings;
use circlepoll::startup::{AppState, app};
use std::net::SocketAddr;

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    let settings = Settings::load().expect("Invalid configuration");

    let app_state = AppState::new(&settings)
        .await
        .expect("Unable to initialise the poll store");

    let app = app(app_state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .expect("Invalid server address");
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    axum::serve(listener, app).await.unwrap();
}
