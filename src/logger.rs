use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tarjetas_backend_rust=info,tower_http=info"));

    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false);

    if json {
        tracing_subscriber::registry().with(filter).with(fmt.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt.compact()).init();
    }
}
