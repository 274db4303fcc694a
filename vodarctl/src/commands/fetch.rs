use tracing::info;
use vodar_core::{GqlClient, VodPipeline};

use crate::{AppError, Cli, FetchArgs, Result};

pub fn execute(cli: &Cli, args: &FetchArgs) -> Result<()> {
    let config = crate::load_config(cli)?;
    let destination = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.work_dir());
    std::fs::create_dir_all(&destination)?;

    let gql = GqlClient::new()?;
    let pipeline = VodPipeline::new(gql.clone())?
        .with_segment_concurrency(config.network.segment_concurrency);

    let runtime = crate::runtime()?;
    let artifact = runtime.block_on(async move {
        let video = gql.fetch_video(&args.video_id).await?;
        info!(video = %video.id, title = %video.title, duration = video.duration, "video found");
        Ok::<_, AppError>(pipeline.download(&video, &destination).await?)
    })?;
    println!("{}", artifact.display());
    Ok(())
}
