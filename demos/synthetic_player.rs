use std::error::Error;
use std::time::Duration;

use futures::StreamExt;
use vdkplay::backend::{SyntheticBackend, SyntheticMedia};
use vdkplay::{LoopMode, PlaybackEvent, PlaybackSession, PlayerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Frame rate and length can be given on the command line
    let fps = std::env::args()
        .nth(1)
        .map(|s| s.parse::<f64>())
        .transpose()?
        .unwrap_or(30.0);
    let frames = std::env::args()
        .nth(2)
        .map(|s| s.parse::<u64>())
        .transpose()?
        .unwrap_or(90);

    vdkplay::init()?;

    let backend = SyntheticBackend::new()
        .with_media("demo", SyntheticMedia::video_with_audio(fps, frames));
    let config = vdkplay::config::global().with_loop_mode(LoopMode::Bidi);
    let session = PlaybackSession::new(Box::new(backend), config);

    session.set_event_handler(|event| match event {
        PlaybackEvent::StateChanged { from, to } => println!("state: {:?} -> {}", from, to),
        PlaybackEvent::Reversed { direction } => println!("reversed, now {:?}", direction),
        PlaybackEvent::Wrapped { to_frame } => println!("wrapped to {}", to_frame),
        PlaybackEvent::Failed { message } => println!("failed: {}", message),
        PlaybackEvent::NewFrame { .. } => {}
    });

    session.open("demo")?;
    print!("{}", session.dump_info());

    // Play the middle half of the clip back and forth
    let quarter = frames / 4;
    if quarter > 0 && quarter < frames - quarter - 1 {
        session.set_cue_range(quarter, frames - quarter - 1)?;
    }
    session.set_speed(2.0)?;
    session.play()?;

    let period = Duration::from_secs_f64(1.0 / (fps * 4.0));
    let mut stream = Box::pin(session.frame_stream(period));
    let mut shown = 0u64;
    while let Some(snapshot) = stream.next().await {
        let bytes = snapshot.video_data().map_or(0, |data| data.len());
        println!(
            "frame {:>4}  {:>9.2} ms  {} bytes",
            snapshot.frame_number, snapshot.time_ms, bytes
        );
        shown += 1;
        if shown >= frames * 2 {
            session.stop()?;
        }
    }

    println!("Displayed {} frames", shown);
    session.close();
    vdkplay::shutdown();
    Ok(())
}
