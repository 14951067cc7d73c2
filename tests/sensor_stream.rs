use approx::assert_relative_eq;
use lidarscan::config::SensorProfile;
use lidarscan::protocol::a2m8::{self, encode_packet};
use lidarscan::protocol::stl27l::{SAMPLES_PER_FRAME, Stl27lFrame, encode_frame};
use lidarscan::sensors::{self, MockTransport, SensorSession, SessionStatus};
use std::time::{Duration, Instant};

fn frames(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| {
            let start = ((i * 300) % 36000) as u16;
            encode_frame(&Stl27lFrame {
                start_angle: start,
                end_angle: start + 275,
                distances: [1500; SAMPLES_PER_FRAME],
            })
        })
        .collect()
}

const A2M8_PACKETS: usize = 80;

/// Express packets advancing 32° each, so every sample steps 1°. Each sample's distance is its
/// 1-based position in the stream, which makes dropped or reordered revolutions visible.
fn a2m8_packets(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|k| {
            let start = (((k + 1) * 32) % 360 * 64) as u16;
            let mut readings = [(0u16, 0i8); a2m8::SAMPLES_PER_PACKET];
            for (i, r) in readings.iter_mut().enumerate() {
                *r = ((k * a2m8::SAMPLES_PER_PACKET + i + 1) as u16, 0);
            }
            encode_packet(start, &readings)
        })
        .collect()
}

/// A scanning A2M8 session with a backlog of packets waiting on its port.
fn a2m8_with_backlog() -> (SensorSession, MockTransport) {
    let profile = SensorProfile {
        reset_delay_ms: 0,
        ..SensorProfile::a2m8()
    };
    let mock = MockTransport::new();
    let mut session = SensorSession::with_transport(profile, mock.clone());

    // The start handshake clears the input buffer, so the packets go in afterwards
    session.begin().unwrap();
    mock.inject_read(&a2m8_packets(A2M8_PACKETS));
    (session, mock)
}

fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let t0 = Instant::now();
    while t0.elapsed() < limit {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn stl27l_stream_delivers_window() {
    let mock = MockTransport::new();
    mock.inject_read(&frames(200));
    let session = SensorSession::with_transport(SensorProfile::stl27l(), mock.clone());

    let stream = sensors::start(session).unwrap();
    let scan = stream
        .iter()
        .take(20)
        .find(|s| !s.is_empty())
        .expect("no populated window");
    assert_eq!(scan.len(), 200 * SAMPLES_PER_FRAME);
    assert!(scan.points().iter().all(|p| (p.coords.norm() - 1500.0).abs() < 1e-6));

    let session = stream.stop().unwrap();
    assert_eq!(session.status(), SessionStatus::Disconnected);
    assert_eq!(session.last_scan().map(|s| s.len()), Some(2400));
    assert_eq!(mock.unread(), 0);
}

#[test]
fn thin_windows_are_empty() {
    let mock = MockTransport::new();
    mock.inject_read(&frames(50));
    let session = SensorSession::with_transport(SensorProfile::stl27l(), mock);

    let stream = sensors::start(session).unwrap();
    let scan = stream.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(scan.is_empty());

    let session = stream.stop().unwrap();
    assert!(session.last_scan().is_none());
}

#[test]
fn unplugged_sensor_ends_stream() {
    let mock = MockTransport::new();
    let session = SensorSession::with_transport(SensorProfile::stl27l(), mock.clone());
    let stream = sensors::start(session).unwrap();

    mock.disconnect();
    assert!(wait_until(Duration::from_secs(2), || stream.is_finished()));
    assert_eq!(stream.status(), SessionStatus::Disconnected);

    let session = stream.stop().unwrap();
    assert!(!session.is_connected());
}

#[test]
fn populated_wait_gives_up_on_thin_windows() {
    let mock = MockTransport::new();
    mock.inject_read(&frames(50));
    let session = SensorSession::with_transport(SensorProfile::stl27l(), mock);

    let stream = sensors::start(session).unwrap();
    let t0 = Instant::now();
    assert!(stream.recv_populated(Duration::from_millis(400)).is_none());
    let elapsed = t0.elapsed();
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);

    stream.stop().unwrap();
}

#[test]
fn slow_consumer_receives_every_revolution() {
    let (session, mock) = a2m8_with_backlog();
    let total = A2M8_PACKETS * a2m8::PACKET_LEN;
    let stream = sensors::start(session).unwrap();

    // One scan fills the channel and the next holds the producer, so reading stalls
    std::thread::sleep(Duration::from_millis(500));
    let unread = mock.unread();
    assert!(unread > 0 && unread < total, "unread {}", unread);

    let scans = (0..7)
        .map_while(|_| stream.recv_timeout(Duration::from_secs(2)))
        .collect::<Vec<_>>();
    assert_eq!(scans.len(), 7);
    assert_eq!(scans[0].len(), 359);
    assert!(scans[1..].iter().all(|s| s.len() == 360));
    for (m, scan) in scans.iter().enumerate() {
        let first = (360 * m).max(1) as f64;
        assert_relative_eq!(scan.points()[0].coords.norm(), first, epsilon = 1e-9);
    }

    let session = stream.stop().unwrap();
    assert_eq!(session.last_scan().map(|s| s.len()), Some(360));
}

#[test]
fn stop_releases_blocked_producer() {
    let (session, mock) = a2m8_with_backlog();
    let stream = sensors::start(session).unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        mock.unread() < A2M8_PACKETS * a2m8::PACKET_LEN
    }));
    std::thread::sleep(Duration::from_millis(200));

    let t0 = Instant::now();
    let session = stream.stop().unwrap();
    assert!(t0.elapsed() < Duration::from_secs(1), "stop took {:?}", t0.elapsed());
    assert_eq!(session.status(), SessionStatus::Disconnected);
    assert!(mock.unread() > 0);
}
