use pulse_http::engine::{HttpEngine, ReturnValue};
use pulse_http::handler::make_handler;
use pulse_http::server::serve;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let handler = make_handler(|request, _response| {
        info!(path = request.path(), "incoming request");
        Ok(ReturnValue::Text(format!("Hello from {}!\r\n", request.path())))
    });

    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    serve(listener, HttpEngine::new(), handler).await
}
