use std::future::Future;

use clap::Args;
use futures::{Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};

use libs::feed::{decode_location_update, Aggregator, PositionHistory};

#[derive(Args)]
pub struct ListenCmd {
    /// keep only the last N positions
    #[arg(long)]
    capacity: Option<usize>,

    /// stop after N positions, otherwise run until ctrl-c
    #[arg(long)]
    count: Option<usize>,
}

pub async fn run_listen_cmd(cmd: &ListenCmd, target: String) -> Result<(), String> {
    let url = format!("ws://{}/", target);
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| format!("Error: {}", e))?;
    println!("Connected to {}", url);

    let aggregator = Aggregator::new(PositionHistory::with_capacity(cmd.capacity));
    let result = follow(
        &mut socket,
        tokio::signal::ctrl_c(),
        &aggregator,
        cmd.count,
    )
    .await;

    // The tracker drops our timer as soon as the socket closes
    if let Err(e) = socket.close(None).await {
        eprintln!("Error: {}", e);
    }

    for marker in aggregator.markers() {
        println!(
            "{}  {:.6}, {:.6}",
            marker.label, marker.position.latitude, marker.position.longitude
        );
    }
    result
}

/// Feeds `locationUpdate` frames into `aggregator` until the stream ends,
/// `count` positions arrived or `shutdown` resolves.
async fn follow<S, F>(
    frames: &mut S,
    shutdown: F,
    aggregator: &Aggregator,
    count: Option<usize>,
) -> Result<(), String>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    F: Future,
{
    // Polled across iterations so a signal between two frames is not lost
    tokio::pin!(shutdown);
    loop {
        if count.is_some_and(|count| aggregator.received() >= count) {
            return Ok(());
        }
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_location_update(&text) {
                    Ok(Some(position)) => {
                        aggregator.receive(position);
                        println!("{:>10.6} {:>10.6}", position.latitude, position.longitude);
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("Error: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(format!("Error: {}", e)),
            },
        }
    }
}
