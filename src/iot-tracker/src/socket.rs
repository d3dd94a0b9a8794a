use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use log::{debug, error, trace};
use tokio::sync::mpsc;

use libs::feed::{encode_location_update, PositionHandler};
use libs::models::Position;

use crate::publisher::Publisher;

pub async fn location_updates(
    ws: WebSocketUpgrade,
    State(publisher): State<Publisher>,
) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, publisher))
}

/// One socket is one subscriber. Positions flow publisher -> channel -> socket;
/// whatever ends the loop, the subscription is dropped and its timer cancelled.
pub async fn serve_subscriber(socket: WebSocket, publisher: Publisher) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Position>();
    let handler: PositionHandler = Arc::new(move |position| {
        // Fire and forget, a gone socket just drops the position
        if tx.send(position).is_err() {
            trace!("subscriber gone, position dropped");
        }
    });

    let mut subscription = match publisher.subscribe(handler) {
        Ok(s) => s,
        Err(error) => {
            error!("can't register subscriber {}", error);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            position = rx.recv() => {
                let Some(position) = position else { break };
                let frame = match encode_location_update(&position) {
                    Ok(frame) => frame,
                    Err(error) => {
                        error!("can't encode position {}", error);
                        continue;
                    }
                };
                if let Err(error) = sender.send(Message::Text(frame)).await {
                    debug!("subscriber {} send failed {}", subscription.id(), error);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!("subscriber {} socket error {}", subscription.id(), error);
                        break;
                    }
                }
            }
        }
    }

    subscription.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use libs::feed::decode_location_update;
    use std::net::SocketAddr;
    use tokio::time::{sleep, timeout, Duration};
    use tokio_tungstenite::{connect_async, tungstenite};

    async fn serve(publisher: Publisher) -> SocketAddr {
        let app = Router::new()
            .route("/", get(location_updates))
            .with_state(publisher);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    async fn wait_for(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        check()
    }

    #[tokio::test]
    async fn dropped_client_cancels_its_timer() {
        let publisher = Publisher::new(Duration::from_millis(50));
        let addr = serve(publisher.clone()).await;

        let (mut client, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = match frame {
            tungstenite::Message::Text(text) => text,
            other => panic!("expected a text frame, got {:?}", other),
        };
        let position = decode_location_update(&text).unwrap().unwrap();
        assert!((51.505..51.515).contains(&position.latitude));
        assert_eq!(publisher.active_timers(), 1);

        drop(client);
        assert!(wait_for(|| publisher.active_timers() == 0).await);
        assert_eq!(publisher.subscribers(), 0);
    }

    #[tokio::test]
    async fn closed_client_cancels_its_timer() {
        let publisher = Publisher::new(Duration::from_millis(50));
        let addr = serve(publisher.clone()).await;

        let (mut first, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        let (_second, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        assert!(wait_for(|| publisher.active_timers() == 2).await);

        first.close(None).await.unwrap();
        assert!(wait_for(|| publisher.active_timers() == 1).await);
    }
}
