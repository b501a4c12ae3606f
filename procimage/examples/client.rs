use std::error::Error;

use procimage::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut registry = StationRegistry::new();

    // 16 bytes streamed from the controller, 4 bytes streamed back
    let mut config = StationConfig::new("plc1", 16, 4);
    config.address = Some("127.0.0.1:2000".parse()?);
    let station = registry.add(config, default_retry_strategy())?;

    let mut updates = station.input_listener();
    loop {
        updates.changed().await?;
        let mut word = [0u8; 2];
        match station.read_array(0, 2, 1, &mut word) {
            Ok(()) => {
                println!("word 0: {:#06X}", u16::from_ne_bytes(word));
                // mirror the first input word into the output image
                if let Err(err) = station.write_array(0, 2, 1, &word) {
                    eprintln!("write failed: {err}");
                }
            }
            Err(err) => eprintln!("read failed: {err}"),
        }
    }
}
