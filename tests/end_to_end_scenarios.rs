//! End-to-end scenarios across channels, serialize, pqueue, and
//! workqueue, mirroring the concrete walkthroughs in `spec.md` §8.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use iocore::channel::backends::mem::MemBufferChannel;
use iocore::channel::{self, AccessMode, Permissions};
use iocore::serialize::format::ascii::AsciiFormat;
use iocore::serialize::format::binary::BinaryFormat;
use iocore::serialize::{Direction, HeaderSizes, Serializable, Serialize, SerializeError, StreamMode};
use iocore::sync::{Barrier, BarrierWaitResult};
use iocore::{PQueue, WorkQueue, WorkQueueTaskStatus};

/// Honors `RUST_LOG` (`SPEC_FULL.md`'s idiomatic stand-in for the source's
/// `VERBOSE=TRUE`) so a failing test can be re-run with logging visible;
/// safe to call from every test since `try_init` only wins the race once.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct MyPoint {
    pos_x: i32,
    pos_y: i32,
}

impl Default for MyPoint {
    fn default() -> Self {
        MyPoint { pos_x: 0, pos_y: 0 }
    }
}

impl Serializable for MyPoint {
    fn serialize(&mut self, name: &str, s: &mut Serialize<'_>) -> iocore::serialize::SerializeResult<()> {
        s.begin_type(name, "MyPoint")?;
        s.int("posX", &mut self.pos_x)?;
        s.int("posY", &mut self.pos_y)?;
        s.end_type(name)
    }
}

/// Scenario 1: open a file for write+create+truncate, write bytes, close,
/// reopen read-only, read them back, observe EOF on the following read.
#[test]
fn file_channel_write_then_read_hits_eof() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x");
    let uri = format!("File://{}", path.display());

    {
        let mut channel = channel::open(
            &uri,
            AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
            Permissions::rw_user(),
        )
        .unwrap();
        channel.write(b"hello").unwrap();
        channel.flush().unwrap();
        channel.close().unwrap();
    }

    let mut channel = channel::open(&uri, AccessMode::READ, Permissions::rw_user()).unwrap();
    let mut buf = [0u8; 5];
    let n = channel.read(&mut buf).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf, b"hello");

    let mut trailing = [0u8; 1];
    let n = channel.read(&mut trailing).unwrap();
    assert_eq!(n, 0);
    assert!(channel.is_eof());
}

/// Scenario 2: serialize a struct through a binary-format session bound to
/// a file channel, reopen, deserialize into a fresh struct.
#[test]
fn binary_struct_round_trips_through_a_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("y");
    let uri = format!("File://{}", path.display());

    let mut point = MyPoint { pos_x: 5, pos_y: 5 };
    {
        let mut channel = channel::open(
            &uri,
            AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
            Permissions::rw_user(),
        )
        .unwrap();
        let mut s = Serialize::new(&mut *channel, Box::new(BinaryFormat::new()), Direction::Write);
        point.serialize("p", &mut s).unwrap();
        channel.flush().unwrap();
        channel.close().unwrap();
    }

    let mut roundtripped = MyPoint::default();
    let mut channel = channel::open(&uri, AccessMode::READ, Permissions::rw_user()).unwrap();
    let mut s = Serialize::new(&mut *channel, Box::new(BinaryFormat::new()), Direction::Read);
    roundtripped.serialize("p", &mut s).unwrap();

    assert_eq!(roundtripped.pos_x, 5);
    assert_eq!(roundtripped.pos_y, 5);
}

/// Scenario 3: a length-4 `PQueue` over a 10-byte blob; push three, pop in
/// order, payloads match byte-for-byte.
#[derive(Clone, PartialEq, Debug)]
struct TenBytes([u8; 10]);

impl Default for TenBytes {
    fn default() -> Self {
        TenBytes([0; 10])
    }
}

impl Serializable for TenBytes {
    fn serialize(&mut self, name: &str, s: &mut Serialize<'_>) -> iocore::serialize::SerializeResult<()> {
        s.begin_type(name, "MemI8")?;
        for (i, byte) in self.0.iter_mut().enumerate() {
            let mut v = *byte as i8;
            s.s_char(&format!("b{i}"), &mut v)?;
            *byte = v as u8;
        }
        s.end_type(name)
    }
}

#[test]
fn pqueue_push_pop_preserves_payload_order_and_bytes() {
    init_tracing();
    let queue: PQueue<TenBytes> = PQueue::new(4).unwrap();
    queue.setup_element(&mut TenBytes([0; 10])).unwrap();

    let mut a = TenBytes([1; 10]);
    let mut b = TenBytes([2; 10]);
    let mut c = TenBytes([3; 10]);

    queue.push(&mut a).unwrap();
    queue.push(&mut b).unwrap();
    queue.push(&mut c).unwrap();
    assert_eq!(queue.len(), 3);

    assert_eq!(queue.pop().unwrap(), a);
    assert_eq!(queue.pop().unwrap(), b);
    assert_eq!(queue.pop().unwrap(), c);
    assert!(queue.is_empty());
}

/// Scenario 4: a `WorkQueue(min=2, max=4)` drains 100 short tasks and every
/// `wait()` observes completion.
#[test]
fn work_queue_drains_many_short_tasks() {
    init_tracing();
    let pool = WorkQueue::new(2, 4).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let completed = Arc::clone(&completed);
            pool.enqueue(
                move || {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    completed.fetch_add(1, Ordering::SeqCst);
                    WorkQueueTaskStatus::Success
                },
                None::<fn(WorkQueueTaskStatus)>,
            )
            .unwrap()
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.wait(), WorkQueueTaskStatus::Success);
    }
    assert_eq!(completed.load(Ordering::SeqCst), 100);
}

/// Scenario 5: open a `Tcp://` channel to a listening server, write a
/// 32-bit network-order integer, and have the server side decode it back
/// to the same host-order value.
#[test]
fn tcp_channel_round_trips_a_network_order_int() {
    init_tracing();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let server_addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        use std::io::Read;
        let (mut conn, _peer) = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();
        i32::from_be_bytes(buf)
    });

    let uri = format!("Tcp://{server_addr}");
    let mut client = channel::open(&uri, AccessMode::READ_WRITE, Permissions::rw_user()).unwrap();
    let value: i32 = -123456;
    client.write(&value.to_be_bytes()).unwrap();
    client.flush().unwrap();

    assert_eq!(server.join().unwrap(), value);
}

/// Scenario 6: a header with a large declared-type string round-trips
/// exactly; a subsequent read under a mismatched format sets the sticky
/// error.
#[test]
fn large_declared_type_round_trips_then_format_mismatch_is_sticky() {
    init_tracing();
    let declared_type: String = "P".repeat(4800);

    let mut buffer = MemBufferChannel::new(AccessMode::READ_WRITE);
    {
        let mut s = Serialize::new(&mut buffer, Box::new(BinaryFormat::new()), Direction::Write)
            .with_stream_mode(StreamMode::HeaderEmbedded);
        s.set_header_sizes(HeaderSizes {
            type_bytes: 5000,
            data_bytes: 0,
            object_bytes: 0,
            stream_bytes: 0,
        });
        let mut x = 1i32;
        s.begin_type("p", &declared_type).unwrap();
        s.int("x", &mut x).unwrap();
        s.end_type("p").unwrap();
    }
    let bytes = buffer.into_inner();

    let mut reader = MemBufferChannel::from_bytes(bytes, AccessMode::READ);
    let mut s = Serialize::new(&mut reader, Box::new(AsciiFormat::new()), Direction::Read)
        .with_stream_mode(StreamMode::HeaderEmbedded);
    let err = s.begin_type("p", &declared_type).unwrap_err();
    assert!(matches!(err, SerializeError::FormatMismatch { .. }));
    assert!(s.error_occurred());
}

/// A barrier with `n` concurrent waiters: exactly one observes `Tripped`,
/// the rest observe `Arrived`, and a second round behaves identically.
#[test]
fn barrier_trips_exactly_once_per_round() {
    init_tracing();
    let barrier = Arc::new(Barrier::new(4));
    for _round in 0..2 {
        let trips = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let trips = Arc::clone(&trips);
                std::thread::spawn(move || {
                    if barrier.wait() == BarrierWaitResult::Tripped {
                        trips.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(trips.load(Ordering::SeqCst), 1);
    }
}
