use std::time::Duration;

use shmframe::{Error, Producer, Wait};

const SEGMENT: &str = "/shmframe_demo";
const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const CHANNELS: u32 = 3;

fn main() -> shmframe::Result<()> {
    let capacity = (WIDTH * HEIGHT * CHANNELS) as usize;
    let mut producer = Producer::create(SEGMENT, capacity)?;
    println!(
        "created segment {} ({} byte arena); start the consumer demo now",
        SEGMENT, capacity
    );

    // Synthetic gradient, packed 8-bit RGB rows.
    let mut pixels = vec![0u8; capacity];
    for y in 0..HEIGHT as usize {
        for x in 0..WIDTH as usize {
            let px = (y * WIDTH as usize + x) * CHANNELS as usize;
            pixels[px] = (x * 255 / WIDTH as usize) as u8;
            pixels[px + 1] = (y * 255 / HEIGHT as usize) as u8;
            pixels[px + 2] = 128;
        }
    }

    for seq in 0u32.. {
        pixels[0] = seq as u8;
        match producer.send(
            &pixels,
            WIDTH,
            HEIGHT,
            CHANNELS,
            Wait::For(Duration::from_millis(100)),
        ) {
            Ok(()) => println!("frame {} consumed", seq),
            // No consumer keeping up; the next write overwrites the frame.
            Err(Error::Timeout(_)) => println!("frame {} not consumed in time, skipping", seq),
            Err(err) => return Err(err),
        }
        std::thread::sleep(Duration::from_millis(500));
    }
    Ok(())
}
