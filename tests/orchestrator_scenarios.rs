/*
 *  tests/orchestrator_scenarios.rs
 *
 *  End to end behaviour of the update orchestrator against recording doubles.
 *
 *  PixooArt - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

mod common;

use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use pixoo_art::hass::{EntityState, HostEvent};
use pixoo_art::imaging::{RenderConfig, encode_gif_base64, process_image, tv_icon};
use pixoo_art::lights::LightCommand;
use pixoo_art::media::PlaybackState;

#[tokio::test]
async fn test_off_to_playing_with_direct_cover() {
    let r = rig(default_settings());
    r.host.set(player("off", None));
    r.orchestrator.handle_state_change(None, player("off", None)).await;
    assert_eq!(r.light_commands(), vec![LightCommand::Off]);
    r.display.take();
    r.lights.commands.lock().unwrap().clear();

    let cover = "http://covers.test/mezzanine.png";
    r.host.set(player("playing", Some(cover)));
    r.orchestrator
        .handle_state_change(Some("off".into()), player("playing", Some(cover)))
        .await;

    assert_eq!(*r.images.requested.lock().unwrap(), vec![cover.to_string()]);
    let gifs = r.display.gifs();
    assert_eq!(gifs.len(), 1);
    assert_ne!(gifs[0], black_gif());
    assert!(r.display.texts().is_empty(), "no search notices for a direct cover");

    let flags = r.orchestrator.flags().await;
    let expected = process_image(&r.images.bytes, &RenderConfig::new(&r.settings, &flags), None, true).unwrap();
    match r.light_commands().as_slice() {
        [LightCommand::On { ambient, accent, brightness_pct }] => {
            assert_eq!(*ambient, Some(expected.background_color));
            assert_eq!(*accent, Some(expected.accent_rgb()));
            assert!(brightness_pct.is_some());
        }
        other => panic!("unexpected light commands {:?}", other),
    }

    // image went up with nothing to overlay, so stale items get wiped
    assert_eq!(r.display.item_lists(), vec![serde_json::json!([])]);

    let status = r.orchestrator.subscribe().borrow().clone();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.pic_source.as_deref(), Some("Direct"));
    assert_eq!(status.title, "Teardrop");
}

#[tokio::test]
async fn test_no_cover_falls_back_to_generated_art() {
    let r = rig(default_settings());
    r.host.set(player("playing", None));
    r.orchestrator.handle_state_change(None, player("playing", None)).await;

    let requested = r.images.requested.lock().unwrap().clone();
    assert_eq!(requested.len(), 1);
    assert!(requested[0].starts_with("http://ai.test/prompt/Massive%20Attack"), "{}", requested[0]);
    assert!(requested[0].contains("model=turbo"));

    assert_eq!(r.display.texts(), vec!["Searching...", "AI Image...", "Loading..."]);
    assert_eq!(r.display.gifs().len(), 1);
    let status = r.orchestrator.subscribe().borrow().clone();
    assert_eq!(status.pic_source.as_deref(), Some("AI"));
}

#[tokio::test(start_paused = true)]
async fn test_short_pause_does_not_blank() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));
    r.orchestrator.handle_state_change(None, player("playing", Some(cover))).await;
    r.display.take();

    r.host.set(player("paused", Some(cover)));
    r.orchestrator
        .handle_state_change(Some("playing".into()), player("paused", Some(cover)))
        .await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    r.host.set(player("playing", Some(cover)));
    r.orchestrator
        .handle_state_change(Some("paused".into()), player("playing", Some(cover)))
        .await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let black = black_gif();
    assert!(r.display.gifs().iter().all(|g| *g != black));
    assert!(!r.light_commands().contains(&LightCommand::Off));
}

#[tokio::test(start_paused = true)]
async fn test_long_pause_blanks_once() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));
    r.orchestrator.handle_state_change(None, player("playing", Some(cover))).await;
    r.display.take();

    r.host.set(player("paused", Some(cover)));
    r.orchestrator
        .handle_state_change(Some("playing".into()), player("paused", Some(cover)))
        .await;

    let black = black_gif();
    let blanks = |r: &Rig| r.display.gifs().iter().filter(|g| **g == black).count();

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(blanks(&r), 0);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(blanks(&r), 1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(blanks(&r), 1);
    assert_eq!(r.light_commands().last(), Some(&LightCommand::Off));
}

#[tokio::test]
async fn test_idle_without_full_control_leaves_panel() {
    let mut settings = default_settings();
    settings.full_control = false;
    let r = rig(settings);
    r.host.set(player("idle", None));
    r.orchestrator.handle_state_change(None, player("idle", None)).await;

    assert!(r.display.gifs().is_empty());
    assert!(r.display.item_lists().is_empty());
    assert_eq!(r.light_commands(), vec![LightCommand::Off]);
}

#[tokio::test]
async fn test_clock_mode_sends_item_list() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));
    r.orchestrator.set_display_mode("Clock").await;

    let lists = r.display.item_lists();
    assert_eq!(lists.len(), 1);
    let items = lists[0].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["TextId"], "101");
}

#[tokio::test]
async fn test_mode_change_clears_image_cache() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));
    r.orchestrator.force_update().await;
    r.orchestrator.force_update().await;
    assert_eq!(r.images.requested.lock().unwrap().len(), 1, "second render is a cache hit");

    r.orchestrator.set_crop_mode("Crop").await;
    assert_eq!(r.images.requested.lock().unwrap().len(), 2);
    assert!(r.orchestrator.flags().await.crop_enabled);
}

#[tokio::test]
async fn test_tick_ignored_when_not_playing() {
    let r = rig(default_settings());
    r.host.set(player("off", None));
    r.orchestrator.handle_state_change(None, player("off", None)).await;
    r.display.take();

    r.orchestrator.handle_event(HostEvent::Tick { position_ms: 5_000 }).await;
    assert!(r.display.take().is_empty());
}

fn station() -> EntityState {
    player("playing", None).with_attr("media_title", json!("Jazz FM"))
}

#[tokio::test]
async fn test_tv_without_art_shows_icon() {
    let r = rig(default_settings());
    let show = player("playing", None)
        .with_attr("media_title", json!("Some Show"))
        .with_attr("app_name", json!("Netflix"))
        .with_attr("media_content_type", json!("tvshow"));
    r.host.set(show.clone());
    r.orchestrator.handle_state_change(None, show).await;

    assert_eq!(r.display.gifs(), vec![encode_gif_base64(&tv_icon()).unwrap()]);
    assert!(r.display.texts().is_empty(), "no artwork search for the icon");
    assert!(r.display.item_lists().is_empty());
    assert!(r.images.requested.lock().unwrap().is_empty());
    assert_eq!(r.light_commands(), vec![LightCommand::Off]);
}

#[tokio::test]
async fn test_station_without_art_gets_info_text() {
    let mut settings = default_settings();
    settings.info_fallback = true;
    let r = rig(settings);
    r.host.set(station());
    r.orchestrator.handle_state_change(None, station()).await;

    assert_eq!(r.display.gifs(), vec![black_gif()]);
    assert_eq!(r.display.texts(), vec!["Searching...", "Massive Attack - Jazz FM"]);
    assert!(r.light_commands().is_empty(), "lights are left alone for the info text");
    assert!(r.images.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_station_without_art_goes_black() {
    let r = rig(default_settings());
    r.host.set(station());
    r.orchestrator.handle_state_change(None, station()).await;

    assert_eq!(r.display.gifs(), vec![black_gif()]);
    assert_eq!(r.display.texts(), vec!["Searching..."]);
    assert_eq!(r.light_commands(), vec![LightCommand::Off]);
    let status = r.orchestrator.subscribe().borrow().clone();
    assert_eq!(status.pic_source, None);
}

#[tokio::test]
async fn test_undecodable_cover_goes_black() {
    let cover = "http://covers.test/broken.png";
    let r = rig_with_images(default_settings(), b"definitely not a png".to_vec());
    r.host.set(player("playing", Some(cover)));
    r.orchestrator.handle_state_change(None, player("playing", Some(cover))).await;

    assert_eq!(*r.images.requested.lock().unwrap(), vec![cover.to_string()]);
    assert_eq!(r.display.gifs(), vec![black_gif()]);
    assert_eq!(r.light_commands(), vec![LightCommand::Off]);
    // the black screen counts as sent, so stale items are wiped
    assert_eq!(r.display.item_lists(), vec![json!([])]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_updates_are_serialised() {
    let cover = "http://covers.test/mezzanine.png";
    let r = rig(default_settings());
    r.host.set(player("playing", Some(cover)));
    r.host.latency_ms.store(50, Ordering::SeqCst);

    tokio::join!(
        r.orchestrator.force_update(),
        r.orchestrator.handle_state_change(None, player("playing", Some(cover))),
        r.orchestrator.force_update(),
    );

    assert_eq!(r.host.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(r.display.gifs().len(), 3);
    assert_eq!(r.images.requested.lock().unwrap().len(), 1);
}
