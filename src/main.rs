use std::collections::HashMap;
use anyhow::Result;
use tracing_subscriber::EnvFilter;
use h2_channel::config::HttpChannelConfig;
use h2_channel::http_object::{HttpRequest, HttpResponse};
use h2_channel::http_type::Method;
use h2_channel::server::ServerBuilder;

fn hello(_req: &mut HttpRequest, mut res: HttpResponse) -> Result<HttpResponse> {
    res.set_header("Content-Type", "text/plain; charset=utf-8");
    res.set_body("Hello, World!");
    Ok(res)
}

fn echo(req: &mut HttpRequest, mut res: HttpResponse) -> Result<HttpResponse> {
    res.set_body(req.body.clone().unwrap_or_default());
    Ok(res)
}

// Channel properties are passed as key=value arguments,
// e.g. `h2-channel h2MaxConcurrentStreams=100 h2ConnectionIdleTimeout=60`.
fn properties_from_args() -> HashMap<String, String> {
    std::env::args()
        .skip(1)
        .filter_map(|arg| arg.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HttpChannelConfig::from_properties(&properties_from_args())?;

    let mut builder = ServerBuilder::new();
    builder
        .host("127.0.0.1")
        .port(8080)
        .config(config)
        .add(Method::GET, "/", hello)
        .add(Method::POST, "/echo", echo);

    let server = builder.build()?;
    server.serve().await
}
