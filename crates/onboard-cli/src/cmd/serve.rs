use anyhow::Context;
use onboard_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    println!(
        "Onboarding API for '{}' on http://localhost:{port}",
        config.product.name
    );

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        tokio::select! {
            res = onboard_server::serve(root_buf, port) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
