extern crate tello_link;

use tello_link::{Result, Tello};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    take_off_and_land().await.unwrap();
}

async fn take_off_and_land() -> Result<()> {
    // takes off and climbs to the operating altitude
    let drone = Tello::new().connect().await?;

    println!("battery: {}", drone.battery().await?);

    drone.turn_clockwise(360).await?;
    drone.move_forward(50).await?;
    drone.move_back(50).await?;

    drone.end().await;

    Ok(())
}
