//! End-to-end tests driving a real bound `TcpListener` over loopback,
//! covering the six scenarios from spec.md §8's "End-to-end scenarios".

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::thread;
use std::time::Duration;

use kvstore_core::protocol::reply::{TAG_ARR, TAG_DBL, TAG_ERR, TAG_INT, TAG_NIL, TAG_STR};
use kvstore_core::Server;

fn start_server(port: u16) {
    let mut server = Server::bind(Ipv4Addr::LOCALHOST, port).expect("bind");
    thread::spawn(move || {
        let _ = server.run();
    });
    // Give the accept loop's first poll() iteration time to start.
    thread::sleep(Duration::from_millis(100));
}

fn connect(port: u16) -> TcpStream {
    for _ in 0..20 {
        if let Ok(s) = TcpStream::connect((Ipv4Addr::LOCALHOST, port)) {
            return s;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("could not connect to test server on port {port}");
}

fn send_request(stream: &mut TcpStream, args: &[&[u8]]) {
    let mut body = Vec::new();
    body.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for a in args {
        body.extend_from_slice(&(a.len() as u32).to_le_bytes());
        body.extend_from_slice(a);
    }
    let mut out = Vec::new();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    stream.write_all(&out).expect("write request");
}

fn send_raw(stream: &mut TcpStream, total_len: u32, body: &[u8]) {
    let mut out = Vec::new();
    out.extend_from_slice(&total_len.to_le_bytes());
    out.extend_from_slice(body);
    stream.write_all(&out).expect("write raw request");
}

/// Read one full reply frame (4-byte length prefix plus body), returning
/// the body's bytes including its leading tag byte.
fn read_reply(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).expect("read reply header");
    let len = u32::from_le_bytes(header) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).expect("read reply body");
    body
}

fn assert_nil(reply: &[u8]) {
    assert_eq!(reply[0], TAG_NIL);
}

fn assert_int(reply: &[u8], expected: i64) {
    assert_eq!(reply[0], TAG_INT);
    assert_eq!(i64::from_le_bytes(reply[1..9].try_into().unwrap()), expected);
}

fn assert_str(reply: &[u8], expected: &[u8]) {
    assert_eq!(reply[0], TAG_STR);
    let len = u32::from_le_bytes(reply[1..5].try_into().unwrap()) as usize;
    assert_eq!(&reply[5..5 + len], expected);
}

fn assert_dbl(reply: &[u8], expected: f64) {
    assert_eq!(reply[0], TAG_DBL);
    assert_eq!(f64::from_le_bytes(reply[1..9].try_into().unwrap()), expected);
}

fn assert_err(reply: &[u8], code: i32) {
    assert_eq!(reply[0], TAG_ERR);
    assert_eq!(i32::from_le_bytes(reply[1..5].try_into().unwrap()), code);
}

#[test]
fn set_get_del_get_cycle() {
    start_server(17001);
    let mut stream = connect(17001);

    send_request(&mut stream, &[b"set", b"k", b"v"]);
    assert_nil(&read_reply(&mut stream));

    send_request(&mut stream, &[b"get", b"k"]);
    assert_str(&read_reply(&mut stream), b"v");

    send_request(&mut stream, &[b"del", b"k"]);
    assert_int(&read_reply(&mut stream), 1);

    send_request(&mut stream, &[b"get", b"k"]);
    assert_nil(&read_reply(&mut stream));
}

#[test]
fn zadd_noop_zscore_zrem_cycle() {
    start_server(17002);
    let mut stream = connect(17002);

    send_request(&mut stream, &[b"zadd", b"z", b"1.0", b"a"]);
    assert_int(&read_reply(&mut stream), 1);

    send_request(&mut stream, &[b"zadd", b"z", b"1.0", b"a"]);
    assert_int(&read_reply(&mut stream), 0);

    send_request(&mut stream, &[b"zscore", b"z", b"a"]);
    assert_dbl(&read_reply(&mut stream), 1.0);

    send_request(&mut stream, &[b"zrem", b"z", b"a"]);
    assert_int(&read_reply(&mut stream), 1);

    send_request(&mut stream, &[b"zscore", b"z", b"a"]);
    assert_nil(&read_reply(&mut stream));
}

#[test]
fn zquery_walks_tuple_order() {
    start_server(17003);
    let mut stream = connect(17003);

    send_request(&mut stream, &[b"zadd", b"z", b"1", b"a"]);
    read_reply(&mut stream);
    send_request(&mut stream, &[b"zadd", b"z", b"2", b"b"]);
    read_reply(&mut stream);
    send_request(&mut stream, &[b"zadd", b"z", b"2", b"c"]);
    read_reply(&mut stream);

    send_request(&mut stream, &[b"zquery", b"z", b"1", b"", b"0", b"10"]);
    let reply = read_reply(&mut stream);
    assert_eq!(reply[0], TAG_ARR);
    let count = u32::from_le_bytes(reply[1..5].try_into().unwrap());
    assert_eq!(count, 6);

    let mut pos = 5;
    let mut expect_str = |buf: &[u8], pos: &mut usize, expected: &[u8]| {
        assert_eq!(buf[*pos], TAG_STR);
        let len = u32::from_le_bytes(buf[*pos + 1..*pos + 5].try_into().unwrap()) as usize;
        assert_eq!(&buf[*pos + 5..*pos + 5 + len], expected);
        *pos += 5 + len;
    };
    let mut expect_dbl = |buf: &[u8], pos: &mut usize, expected: f64| {
        assert_eq!(buf[*pos], TAG_DBL);
        assert_eq!(f64::from_le_bytes(buf[*pos + 1..*pos + 9].try_into().unwrap()), expected);
        *pos += 9;
    };
    expect_str(&reply, &mut pos, b"a");
    expect_dbl(&reply, &mut pos, 1.0);
    expect_str(&reply, &mut pos, b"b");
    expect_dbl(&reply, &mut pos, 2.0);
    expect_str(&reply, &mut pos, b"c");
    expect_dbl(&reply, &mut pos, 2.0);
    assert_eq!(pos, reply.len());
}

#[test]
fn pipelined_sets_reply_in_order_without_interleaved_reads() {
    start_server(17004);
    let mut stream = connect(17004);

    send_request(&mut stream, &[b"set", b"a", b"1"]);
    send_request(&mut stream, &[b"set", b"b", b"2"]);
    send_request(&mut stream, &[b"set", b"c", b"3"]);

    assert_nil(&read_reply(&mut stream));
    assert_nil(&read_reply(&mut stream));
    assert_nil(&read_reply(&mut stream));
}

#[test]
fn type_mismatch_is_err_type() {
    start_server(17005);
    let mut stream = connect(17005);

    send_request(&mut stream, &[b"set", b"k", b"x"]);
    read_reply(&mut stream);

    send_request(&mut stream, &[b"zscore", b"k", b"x"]);
    assert_err(&read_reply(&mut stream), 3);
}

#[test]
fn oversize_request_closes_connection_without_a_reply() {
    start_server(17006);
    let mut stream = connect(17006);

    send_raw(&mut stream, 5000, &[0u8; 16]);

    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).expect("read after oversize request");
    assert_eq!(n, 0, "expected EOF, got data");
}
