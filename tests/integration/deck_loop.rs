//! The async deck loop with the external command socket enabled.

use std::net::TcpListener as StdListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deckpilot::comm::server::send_command;
use deckpilot::comm::{EventBus, EventType, ExternalCommandMessage};
use deckpilot::deck::{CommandAddr, DeckManager, RunOptions};
use deckpilot::device::DeviceModel;

use crate::common::fixtures::{Workspace, load_registry};
use crate::common::init_test_logging;

fn free_port() -> u16 {
    StdListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free port")
}

fn record_topics(bus: &EventBus) -> Arc<Mutex<Vec<EventType>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for topic in EventType::BUILTIN {
        let seen = Arc::clone(&seen);
        bus.subscribe(topic.clone(), move |e| seen.lock().unwrap().push(e.topic.clone()));
    }
    seen
}

/// Send from a blocking thread, retrying until the server is up.
async fn send(port: u16, message: ExternalCommandMessage) -> ExternalCommandMessage {
    tokio::task::spawn_blocking(move || {
        let mut last = None;
        for _ in 0..100 {
            match send_command("127.0.0.1", port, &message, Duration::from_secs(2)) {
                Ok(reply) => return reply,
                Err(e) => last = Some(e),
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("command server never answered: {last:?}");
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_and_push_through_socket() {
    init_test_logging();
    let ws = Workspace::new();
    let root = ws.flat_tree(3);
    let (deck, registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    let seen = record_topics(&bus);

    let manager = DeckManager::new(deck.clone(), bus.clone(), 40);
    let handle = manager.handle();
    let port = free_port();
    let options = RunOptions {
        clock_tick_interval: Duration::ZERO,
        hidden_clock_tick_interval: Duration::ZERO,
        command_server: Some(CommandAddr {
            host: "127.0.0.1".to_string(),
            port,
        }),
        poll_timeout: Duration::from_millis(5),
    };
    let task = tokio::spawn(manager.run(registry, options));

    let reply = send(port, ExternalCommandMessage::echo("hello")).await;
    assert_eq!(
        reply,
        ExternalCommandMessage::Pong {
            message: "PONG".to_string(),
            echo: Some("hello".to_string()),
        }
    );

    let reply = send(port, ExternalCommandMessage::push(1, 0.05).unwrap()).await;
    assert!(
        matches!(reply, ExternalCommandMessage::PushAck { key: 1, success: true, .. }),
        "{reply:?}"
    );

    let reply = send(port, ExternalCommandMessage::push(99, 0.05).unwrap()).await;
    assert!(
        matches!(reply, ExternalCommandMessage::PushAck { success: false, error: Some(_), .. }),
        "{reply:?}"
    );

    // The accepted push releases itself once its duration elapses.
    let mut released = false;
    for _ in 0..100 {
        if seen.lock().unwrap().contains(&EventType::KeyReleased) {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "pushed key was never released");

    assert!(handle.shutdown());
    task.await.unwrap().unwrap();
    assert_eq!(deck.brightness(), 40);
    assert_eq!(seen.lock().unwrap().last(), Some(&EventType::Exit));
}

#[tokio::test]
async fn test_handle_press_drives_navigation() {
    let ws = Workspace::new();
    let root = ws.sample_tree();
    let (deck, registry, bus) = load_registry(DeviceModel::Original, Some(&root));
    let activated = Arc::new(Mutex::new(Vec::new()));
    {
        let activated = Arc::clone(&activated);
        bus.subscribe(EventType::PanelActivated, move |e| {
            activated.lock().unwrap().push(e.source.clone());
        });
    }

    let manager = DeckManager::new(deck, bus, 30);
    let handle = manager.handle();
    let options = RunOptions {
        clock_tick_interval: Duration::ZERO,
        hidden_clock_tick_interval: Duration::ZERO,
        command_server: None,
        poll_timeout: Duration::from_millis(5),
    };
    let task = tokio::spawn(manager.run(registry, options));

    assert!(handle.press(1));
    assert!(handle.release(1));
    for _ in 0..100 {
        if !activated.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(activated.lock().unwrap().as_slice(), [Some("apps".to_string())]);

    assert!(handle.shutdown());
    task.await.unwrap().unwrap();
}
