/*
 *  tests/service_loop.rs
 *
 *  Poller, event loop and orchestrator running together.
 *
 *  PixooArt - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

mod common;

use std::time::Duration;

use common::*;
use pixoo_art::media::PlaybackState;
use pixoo_art::service::PixooService;

#[tokio::test(start_paused = true)]
async fn test_poller_drives_display() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));

    let mut status = r.orchestrator.subscribe();
    let service = PixooService::run(r.orchestrator.clone(), r.host.clone(), PLAYER.to_string(), Duration::from_secs(1));

    tokio::time::timeout(Duration::from_secs(5), status.changed()).await.unwrap().unwrap();
    assert_eq!(status.borrow().state, PlaybackState::Playing);
    assert_eq!(r.display.gifs().len(), 1);

    // a new track arrives on a later poll
    let mut next = player("playing", Some("http://covers.test/other.png"));
    next = next.with_attr("media_title", serde_json::json!("Angel"));
    r.host.set(next);
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(status.borrow().title, "Angel");
    assert_eq!(r.images.requested.lock().unwrap().len(), 2);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_player_turning_off() {
    let r = rig(default_settings());
    r.host.set(player("playing", Some("http://covers.test/mezzanine.png")));
    let service = PixooService::run(r.orchestrator.clone(), r.host.clone(), PLAYER.to_string(), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(500)).await;

    r.host.set(player("off", None));
    tokio::time::sleep(Duration::from_secs(2)).await;

    let black = black_gif();
    assert_eq!(r.display.gifs().iter().filter(|g| **g == black).count(), 1);
    assert_eq!(r.light_commands().last(), Some(&pixoo_art::lights::LightCommand::Off));
    service.shutdown().await;
}
