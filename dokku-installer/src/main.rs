mod app;
mod cmd;
mod config;
mod lifecycle;
mod page;
mod probe;
mod server;
mod setup;
mod state;

use clap::Parser;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    app::run(config).await
}
