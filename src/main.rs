use rstto::app::RsttoApp;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rstto=info".parse().unwrap()),
        )
        .init();

    let app = RsttoApp::new();
    std::process::exit(app.run());
}
