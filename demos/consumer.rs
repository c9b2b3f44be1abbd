use std::time::Duration;

use shmframe::{CancelToken, Consumer};

const SEGMENT: &str = "/shmframe_demo";

fn main() -> shmframe::Result<()> {
    let mut consumer = Consumer::attach(SEGMENT)?;
    println!(
        "attached to {} ({} byte arena); press Enter to stop",
        SEGMENT,
        consumer.capacity()
    );

    let token = CancelToken::new();
    let stop = token.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        stop.cancel();
    });

    while let Some(frame) = consumer.recv_cancellable(Duration::from_millis(100), &token)? {
        println!(
            "received {}x{} frame, {} channels, {} bytes (seq byte {})",
            frame.width,
            frame.height,
            frame.channels,
            frame.data.len(),
            frame.data.first().copied().unwrap_or(0)
        );
    }
    println!("stopped");
    Ok(())
}
