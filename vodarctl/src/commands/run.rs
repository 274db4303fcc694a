use std::sync::Arc;

use tracing::info;
use vodar_core::{GqlClient, LocalArchiveStore, VodPipeline, Watchdog, WatchdogConfig};

use crate::{AppError, Cli, Result};

pub fn execute(cli: &Cli) -> Result<()> {
    let config = crate::load_config(cli)?;
    let store = crate::open_store(cli, &config)?;
    let gql = GqlClient::new()?;
    let pipeline = VodPipeline::new(gql.clone())?
        .with_segment_concurrency(config.network.segment_concurrency);
    let watchdog_config = WatchdogConfig::new(config.channel.login.clone(), config.work_dir())
        .with_poll_interval(config.poll_interval());
    let archive = LocalArchiveStore::new(config.archive_dir());
    let mut watchdog = Watchdog::new(watchdog_config, store, Arc::new(gql), Arc::new(pipeline))
        .with_archive_store(Arc::new(archive));

    let runtime = crate::runtime()?;
    runtime.block_on(async move {
        watchdog.run()?;
        tokio::signal::ctrl_c().await?;
        info!("interrupt received, stopping watchdog");
        watchdog.stop().await?;
        Ok::<(), AppError>(())
    })
}
