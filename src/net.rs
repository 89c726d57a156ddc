use std::sync::Arc;
use futures::{StreamExt, SinkExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::drift_core::{ControlSample, Stick};
use crate::state::{ServerMessage, SharedGameState};

/// What a renderer client may send.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input {
        #[serde(default)]
        steer: Stick,
        #[serde(default)]
        throttle: Stick,
    },
    Reset,
    Ping,
}

impl ClientMessage {
    pub fn from_json(txt: &str) -> Option<Self> {
        serde_json::from_str(txt).ok()
    }
}

pub async fn serve(listener: TcpListener, state: Arc<Mutex<SharedGameState>>) {
    if let Ok(addr) = listener.local_addr() {
        info!("websocket listening on ws://{addr}");
    }

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        tokio::spawn(handle_client(raw, peer.to_string(), Arc::clone(&state)));
    }
}

async fn handle_client(raw: TcpStream, peer: String, state: Arc<Mutex<SharedGameState>>) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, %err, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // -------------------------------
    // 1) Outgoing message channel + send loop
    // -------------------------------
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.lock().await.register_client(tx.clone());

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // -------------------------------
    // 2) One car per connection
    // -------------------------------
    let car_id = state.lock().await.add_car();
    info!(%peer, car = %car_id, "driver connected");

    if let Some(welcome) = (ServerMessage::Welcome { car_id: car_id.clone() }).to_json() {
        let _ = tx.send(welcome);
    }

    // -------------------------------
    // 3) Receive loop: latch controls for the frame loop
    // -------------------------------
    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => break,
        };
        if msg.is_close() {
            break;
        }
        let text = match msg.to_text() {
            Ok(t) if msg.is_text() => t,
            _ => continue,
        };

        let Some(parsed) = ClientMessage::from_json(text) else {
            debug!(car = %car_id, "ignoring malformed message");
            continue;
        };

        match parsed {
            ClientMessage::Input { steer, throttle } => {
                state.lock().await.update_input(&car_id, ControlSample::new(steer, throttle));
            }
            ClientMessage::Reset => state.lock().await.reset_car(&car_id),
            ClientMessage::Ping => {
                if let Some(pong) = ServerMessage::Pong.to_json() {
                    let _ = tx.send(pong);
                }
            }
        }
    }

    info!(%peer, car = %car_id, "driver disconnected");
    state.lock().await.remove_car(&car_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_input_messages() {
        let msg = ClientMessage::from_json(
            r#"{"type":"input","steer":{"x":0.25,"y":0.0},"throttle":{"x":0.0,"y":-0.5}}"#,
        );
        assert_eq!(
            msg,
            Some(ClientMessage::Input { steer: Stick::new(0.25, 0.0), throttle: Stick::new(0.0, -0.5) })
        );
    }

    #[test]
    fn missing_stick_reads_as_released() {
        let msg = ClientMessage::from_json(r#"{"type":"input","throttle":{"x":0.0,"y":1.0}}"#);
        assert_eq!(
            msg,
            Some(ClientMessage::Input { steer: Stick::default(), throttle: Stick::new(0.0, 1.0) })
        );
    }

    #[test]
    fn parses_control_messages_and_rejects_junk() {
        assert_eq!(ClientMessage::from_json(r#"{"type":"ping"}"#), Some(ClientMessage::Ping));
        assert_eq!(ClientMessage::from_json(r#"{"type":"reset"}"#), Some(ClientMessage::Reset));
        assert_eq!(ClientMessage::from_json(r#"{"type":"warp"}"#), None);
        assert_eq!(ClientMessage::from_json("not json"), None);
    }

    #[tokio::test]
    async fn connected_driver_gets_welcome_and_snapshots() {
        use crate::config::SimConfig;
        use tokio_tungstenite::connect_async;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(SharedGameState::new(SimConfig::default().setup().unwrap())));
        tokio::spawn(serve(listener, Arc::clone(&state)));

        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        let welcome = ws.next().await.unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(welcome.to_text().unwrap()).unwrap();
        assert_eq!(v["type"], "welcome");
        let car_id = v["car_id"].as_str().unwrap().to_string();

        ws.send(Message::Text(
            r#"{"type":"input","throttle":{"x":0.0,"y":1.0}}"#.to_string(),
        ))
        .await
        .unwrap();

        // the input is latched asynchronously; wait until it lands
        for _ in 0..100 {
            if state.lock().await.cars.get(&car_id).is_some_and(|c| c.input.sample.throttle.y == 1.0) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        {
            let mut game = state.lock().await;
            game.step_all(0.0);
            game.step_all(0.016);
            game.broadcast_snapshot();
        }

        let snap = ws.next().await.unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(snap.to_text().unwrap()).unwrap();
        assert_eq!(v["type"], "snapshot");
        assert_eq!(v["cars"][0]["id"], car_id.as_str());
        assert!(v["cars"][0]["rpm"].as_f64().unwrap() > 0.0);
    }
}
