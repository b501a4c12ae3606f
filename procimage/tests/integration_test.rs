use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use procimage::*;

fn retry_quickly() -> Box<dyn RetryStrategy> {
    fixed_retry_strategy(Duration::from_millis(100))
}

async fn bind() -> (TcpListener, HostAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = listener.local_addr().unwrap();
    (listener, HostAddr::ip(local.ip(), local.port()))
}

/// Drain whatever the station sends so the socket stays open until EOF
async fn hold_open(socket: &mut tokio::net::TcpStream) {
    let mut sink = [0u8; 64];
    while socket.read(&mut sink).await.unwrap_or(0) > 0 {}
}

#[tokio::test]
async fn receives_and_swaps_a_frame() {
    let (listener, addr) = bind().await;
    let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        go_rx.await.unwrap();
        socket.write_all(&[0x01, 0x02, 0x03, 0x04]).await.unwrap();
        hold_open(&mut socket).await;
    });

    let mut registry = StationRegistry::new();
    let mut config = StationConfig::new("plc1", 4, 2);
    config.address = Some(addr);
    // remote endianness opposite the host, so accessors swap
    config.big_endian = !cfg!(target_endian = "big");
    // the stub sends a single frame and then goes quiet
    config.recv_timeout = Duration::ZERO;
    let station = registry.add(config, retry_quickly()).unwrap();

    let mut updates = station.input_listener();
    go_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();

    let mut dest = [0u8; 4];
    station.read_array(0, 4, 1, &mut dest).unwrap();
    assert_eq!(dest, [0x04, 0x03, 0x02, 0x01]);
    assert!(station.is_connected());
}

#[tokio::test]
async fn discards_partial_frames_and_reconnects() {
    let (listener, addr) = bind().await;
    let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
    let (drop_tx, drop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        // first connection: one full frame, then half a frame, then close
        let (mut socket, _) = listener.accept().await.unwrap();
        go_rx.await.unwrap();
        socket.write_all(&[0xAA, 0xBB]).await.unwrap();
        drop_rx.await.unwrap();
        socket.write_all(&[0x01]).await.unwrap();
        drop(socket);
        // second connection: a fresh frame, then hold
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&[0xCC, 0xDD]).await.unwrap();
        hold_open(&mut socket).await;
    });

    let mut registry = StationRegistry::new();
    let mut config = StationConfig::new("plc1", 2, 0);
    config.address = Some(addr);
    config.big_endian = cfg!(target_endian = "big");
    config.recv_timeout = Duration::ZERO;
    let station = registry
        .add(config, fixed_retry_strategy(Duration::from_secs(1)))
        .unwrap();

    let mut updates = station.input_listener();
    go_tx.send(()).unwrap();

    // the first complete frame arrives
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    let mut dest = [0u8; 2];
    station.read_array(0, 1, 2, &mut dest).unwrap();
    assert_eq!(dest, [0xAA, 0xBB]);

    // the peer dies mid-frame: the partial byte is discarded and the
    // last good image stays readable, flagged as stale
    drop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    let mut stale = [0u8; 2];
    assert_eq!(
        station.read_array(0, 1, 2, &mut stale),
        Err(AccessError::NotConnected)
    );
    assert_eq!(stale, [0xAA, 0xBB]);

    // after the retry delay the station reconnects on its own
    tokio::time::timeout(Duration::from_secs(10), updates.changed())
        .await
        .unwrap()
        .unwrap();
    let mut fresh = [0u8; 2];
    station.read_array(0, 1, 2, &mut fresh).unwrap();
    assert_eq!(fresh, [0xCC, 0xDD]);
}

#[tokio::test]
async fn coalesces_writes_into_one_send() {
    let (listener, addr) = bind().await;
    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::channel::<[u8; 2]>(16);
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        loop {
            let mut frame = [0u8; 2];
            if socket.read_exact(&mut frame).await.is_err() {
                break;
            }
            if frame_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut registry = StationRegistry::new();
    let mut config = StationConfig::new("plc1", 0, 2);
    config.address = Some(addr);
    config.big_endian = cfg!(target_endian = "big");
    config.send_interval = Duration::from_millis(250);
    let station = registry.add(config, retry_quickly()).unwrap();

    // every (re)connect pushes the current output state once
    let initial = tokio::time::timeout(Duration::from_secs(5), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(initial, [0x00, 0x00]);

    // a burst of writes within one interval merges into a single frame
    station.write_array(0, 1, 1, &[0b0101]).unwrap();
    station
        .write_masked_array(0, 1, 1, &[0b1010], Some(&[0b1100]))
        .unwrap();
    station.write_array(1, 1, 1, &[0x07]).unwrap();

    let merged = tokio::time::timeout(Duration::from_secs(5), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged, [0b1001, 0x07]);

    // nothing further goes out while the image stays clean
    assert!(
        tokio::time::timeout(Duration::from_millis(900), frame_rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn set_address_repoints_the_station() {
    async fn marker_server(listener: TcpListener, marker: u8) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            if socket.write_all(&[marker]).await.is_err() {
                continue;
            }
            hold_open(&mut socket).await;
        }
    }

    async fn wait_for_byte(station: &Station, updates: &mut UpdateListener, expected: u8) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                updates.changed().await.unwrap();
                let mut byte = [0u8; 1];
                if station.read_array(0, 1, 1, &mut byte).is_ok() && byte[0] == expected {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }

    let (listener_a, addr_a) = bind().await;
    let (listener_b, addr_b) = bind().await;
    tokio::spawn(marker_server(listener_a, 0x42));
    tokio::spawn(marker_server(listener_b, 0x43));

    let mut registry = StationRegistry::new();
    let mut config = StationConfig::new("plc1", 1, 0);
    config.big_endian = cfg!(target_endian = "big");
    config.recv_timeout = Duration::ZERO;
    // no address yet: the station stays parked without consuming attempts
    let station = registry.add(config, retry_quickly()).unwrap();
    let mut updates = station.input_listener();
    assert!(!station.is_connected());

    station.set_address(Some(addr_a));
    wait_for_byte(&station, &mut updates, 0x42).await;

    // repointing drops the live connection and reconnects on its own
    station.set_address(Some(addr_b.clone()));
    wait_for_byte(&station, &mut updates, 0x43).await;
    assert_eq!(station.address(), Some(addr_b));
}
