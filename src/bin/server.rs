//! API Server Binary
//!
//! Serves sign-in, account linking, and player settings.
//! Configuration comes from flags or the environment; see `--help`.

use clap::Parser;
use skullking::core::kys;
use skullking::core::log;
use skullking::server::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    log();
    kys();
    skullking::server::run(Config::parse()).await
}
