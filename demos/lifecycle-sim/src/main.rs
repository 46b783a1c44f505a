//! Lifecycle simulator: a Confab room over mock channels.
//!
//! Walks one room through its life — attach, chat, a transient
//! disconnect that heals inside the grace period, a suspension that
//! triggers the retry recovery sequence, and finally release — while
//! narrating every public status change.
//!
//! ```text
//! cargo run -p lifecycle-sim
//! ```

use std::sync::Arc;
use std::time::Duration;

use confab::prelude::*;
use confab_realtime::mock::MockRealtime;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,confab_room=debug".into()),
        )
        .init();

    let realtime = Arc::new(MockRealtime::new("demo-user"));
    let client = ConfabClient::new(Arc::clone(&realtime));

    let room = client
        .rooms()
        .get("demo", RoomOptions::default())
        .await
        .expect("fresh registry");

    // Narrate every public status change the room goes through.
    let mut changes = room.on_status_change(BufferingPolicy::Unbounded);
    let narrator = tokio::spawn(async move {
        while let Some(change) = changes.next().await {
            tracing::info!(
                from = %change.previous,
                to = %change.current,
                "room status changed"
            );
        }
    });

    room.attach().await.expect("attach");
    room.messages().send("hello from the simulator").await.unwrap();
    if let Some(typing) = room.typing() {
        typing.start().await.unwrap();
        typing.stop().await.unwrap();
    }

    let chat = realtime.channel(&chat_channel_name("demo"));

    // A transient disconnect that heals inside the 5 s grace period:
    // the room status never budges.
    tracing::info!("simulating a transient disconnect");
    chat.emit_state_change(ChannelStateChange {
        current: ChannelState::Attaching,
        previous: ChannelState::Attached,
        event: ChannelEvent::Attaching,
        resumed: false,
        reason: None,
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    chat.emit_state_change(ChannelStateChange {
        current: ChannelState::Attached,
        previous: ChannelState::Attaching,
        event: ChannelEvent::Attached,
        resumed: true,
        reason: None,
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!(status = %room.status().await, "after healed disconnect");

    // A suspension: the room schedules a Retry, detaches the other
    // channels, and waits for the suspended channel to recover.
    tracing::info!("simulating a suspension");
    chat.emit_state_change(ChannelStateChange {
        current: ChannelState::Suspended,
        previous: ChannelState::Attached,
        event: ChannelEvent::Suspended,
        resumed: false,
        reason: Some(ErrorInfo::new(80_003, 500, "connection lost")),
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    tracing::info!("channel recovers; retry re-attaches the room");
    chat.emit_state_change(ChannelStateChange {
        current: ChannelState::Attached,
        previous: ChannelState::Suspended,
        event: ChannelEvent::Attached,
        resumed: false,
        reason: None,
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    tracing::info!(status = %room.status().await, "after recovery");

    client.rooms().release("demo").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    narrator.abort();
    tracing::info!("simulation complete");
}
