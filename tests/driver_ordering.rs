use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rotlog::rotation::list_backups;
use rotlog::{backup_path, Driver, DriverState, Error, FileRotator, Rotate, RotateConfig};
use tempfile::tempdir;

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read file")
}

fn config_for(path: &Path, interval: Duration, keep: usize) -> RotateConfig {
    let mut config = RotateConfig::new(path);
    config.interval = interval;
    config.keep = keep;
    config
}

#[test]
fn rotation_between_lines_splits_files() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out.log");
    let config = config_for(&path, Duration::from_secs(3600), 9);

    let mut driver =
        Driver::start(FileRotator::new(&path, config.keep), &config).expect("driver start");
    assert_eq!(driver.state(), DriverState::Running);
    assert!(path.exists());

    driver.write_line(b"a\n").expect("write a");
    driver.write_line(b"b\n").expect("write b");
    driver.rotate_now().expect("rotate");
    driver.write_line(b"c\n").expect("write c");
    let stats = driver.finish().expect("finish");

    assert_eq!(read(&backup_path(&path, 1)), "a\nb\n");
    assert_eq!(read(&path), "c\n");
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.bytes, 6);
    assert_eq!(stats.rotations, 1);
    assert_eq!(stats.state, DriverState::Stopped);
}

#[test]
fn timer_rotates_while_running() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out.log");
    let config = config_for(&path, Duration::from_millis(200), 9);

    let driver =
        Driver::start(FileRotator::new(&path, config.keep), &config).expect("driver start");
    let (tx, rx) = mpsc::sync_channel(16);
    let producer = thread::spawn(move || {
        tx.send(b"a\n".to_vec()).expect("send a");
        tx.send(b"b\n".to_vec()).expect("send b");
        thread::sleep(Duration::from_millis(300));
        tx.send(b"c\n".to_vec()).expect("send c");
    });

    let stats = driver.run(&rx).expect("driver run");
    producer.join().expect("producer");

    assert_eq!(stats.state, DriverState::Stopped);
    assert_eq!(stats.rotations, 1);
    assert_eq!(read(&backup_path(&path, 1)), "a\nb\n");
    assert_eq!(read(&path), "c\n");
}

#[test]
fn every_line_lands_once_in_order() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("out.log");
    let mut config = config_for(&path, Duration::from_millis(5), 10_000);
    config.queue_capacity = 64;
    config.write_buffer = 256;

    let driver =
        Driver::start(FileRotator::new(&path, config.keep), &config).expect("driver start");
    let (tx, rx) = mpsc::sync_channel(config.queue_capacity);
    let producer = thread::spawn(move || {
        for i in 0..2_000u32 {
            tx.send(format!("line-{i}\n").into_bytes()).expect("send");
            if i % 100 == 0 {
                thread::sleep(Duration::from_millis(3));
            }
        }
    });

    let stats = driver.run(&rx).expect("driver run");
    producer.join().expect("producer");
    assert_eq!(stats.lines, 2_000);
    assert!(stats.rotations > 0);

    let backups = list_backups(&path).expect("list");
    let indices: Vec<usize> = backups.iter().copied().collect();
    assert_eq!(indices, (1..=backups.len()).collect::<Vec<_>>());

    let mut combined = String::new();
    for index in backups.iter().rev() {
        let content = read(&backup_path(&path, *index));
        assert!(content.is_empty() || content.ends_with('\n'));
        combined.push_str(&content);
    }
    combined.push_str(&read(&path));

    let expected: String = (0..2_000u32).map(|i| format!("line-{i}\n")).collect();
    assert_eq!(combined, expected);
}

#[derive(Clone, Default)]
struct Recorded(Arc<Mutex<Vec<u8>>>);

impl Recorded {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().expect("lock").clone()
    }
}

struct FailingWriter {
    written: Recorded,
    writes_left: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "device full"));
        }
        self.writes_left -= 1;
        self.written.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FailingRotator {
    written: Recorded,
}

impl Rotate for FailingRotator {
    type Handle = FailingWriter;

    fn rotate(&mut self) -> rotlog::Result<FailingWriter> {
        Ok(FailingWriter {
            written: self.written.clone(),
            writes_left: 1,
        })
    }
}

#[test]
fn write_failure_stops_processing() {
    let mut config = RotateConfig::new("unused.log");
    config.interval = Duration::from_secs(3600);
    config.write_buffer = 0;

    let written = Recorded::default();
    let driver = Driver::start(
        FailingRotator {
            written: written.clone(),
        },
        &config,
    )
    .expect("driver start");

    let (tx, rx) = mpsc::sync_channel(8);
    for line in ["a\n", "b\n", "c\n"] {
        tx.send(line.as_bytes().to_vec()).expect("send");
    }
    drop(tx);

    let err = driver.run(&rx).expect_err("run must fail");
    assert!(matches!(err, Error::Write(_)), "unexpected error: {err}");
    assert_eq!(written.contents(), b"a\n");
    assert_eq!(rx.try_recv().expect("c still queued"), b"c\n".to_vec());
}

struct FlakyRotator {
    calls: usize,
}

impl Rotate for FlakyRotator {
    type Handle = io::Sink;

    fn rotate(&mut self) -> rotlog::Result<io::Sink> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(Error::CreateActive {
                path: "out.log".into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(io::sink())
    }
}

#[test]
fn rotation_failure_is_surfaced() {
    let config = RotateConfig::new("out.log");
    let mut driver = Driver::start(FlakyRotator { calls: 0 }, &config).expect("driver start");

    driver.write_line(b"before\n").expect("write");
    let err = driver.rotate_now().expect_err("rotation must fail");
    assert!(matches!(err, Error::CreateActive { .. }), "unexpected error: {err}");
}
