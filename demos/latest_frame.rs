extern crate tello_link;

use std::time::Duration;

use tello_link::{Result, Tello, TelloOptions};

/// Polls the background frame reader for a few seconds. Pass `--local` to use
/// the local camera (needs the `camera` feature) instead of a drone.
#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut options = TelloOptions::default();
    if std::env::args().any(|a| a == "--local") {
        options.with_local_target(0);
    }

    watch_frames(options).await.unwrap();
}

async fn watch_frames(options: TelloOptions) -> Result<()> {
    let drone = Tello::with_options(options).connect().await?;
    let reader = drone.frame_reader().await?;
    println!("video from {}", drone.video_address());

    for _ in 0..20 {
        let frame = reader.latest_frame();
        println!("latest frame: {} bytes ({:?})", frame.data.len(), reader.state());
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    drone.end().await;

    Ok(())
}
