//! Thin shell-style client: sends one request built from argv, reads one
//! reply, and prints it per spec.md §6's human-readable format.
//!
//! Ground truth for the request/reply round trip: `client/client.cxx`'s
//! `sendRequest`/`readResponse`.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::process::ExitCode;

use clap::Parser;
use log::error;

use kvstore_core::protocol::reply::{TAG_ARR, TAG_DBL, TAG_ERR, TAG_INT, TAG_NIL, TAG_STR};
use kvstore_core::protocol::MAX_MESSAGE_SIZE;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port.
    #[arg(short, long, default_value_t = 1234)]
    port: u16,

    /// Server address.
    #[arg(short, long, default_value_t = Ipv4Addr::LOCALHOST)]
    bind: Ipv4Addr,

    /// Command and arguments, e.g. `set foo bar`.
    #[arg(required = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut stream = match TcpStream::connect((args.bind, args.port)) {
        Ok(s) => s,
        Err(e) => {
            error!("connect to {}:{} failed: {}", args.bind, args.port, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = send_request(&mut stream, &args.command) {
        error!("send request failed: {}", e);
        return ExitCode::FAILURE;
    }

    match read_reply(&mut stream) {
        Ok(bytes) => {
            let mut pos = 0;
            print_reply(&bytes, &mut pos);
            println!();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("read response failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn send_request(stream: &mut TcpStream, command: &[String]) -> std::io::Result<()> {
    let mut body = Vec::new();
    body.extend_from_slice(&(command.len() as u32).to_le_bytes());
    for word in command {
        let bytes = word.as_bytes();
        body.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        body.extend_from_slice(bytes);
    }

    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    stream.write_all(&out)
}

fn read_reply(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "reply too long"));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Ok(body)
}

/// Recursively print one tagged reply starting at `*pos`, advancing `*pos`
/// past it.
fn print_reply(buf: &[u8], pos: &mut usize) {
    let tag = buf[*pos];
    *pos += 1;
    match tag {
        TAG_NIL => print!("(nil)"),
        TAG_ERR => {
            let code = i32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
            *pos += 4;
            let len = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap()) as usize;
            *pos += 4;
            let msg = String::from_utf8_lossy(&buf[*pos..*pos + len]);
            *pos += len;
            print!("(err) {code} {msg}");
        }
        TAG_STR => {
            let len = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap()) as usize;
            *pos += 4;
            let text = String::from_utf8_lossy(&buf[*pos..*pos + len]);
            *pos += len;
            print!("(str) {text}");
        }
        TAG_INT => {
            let v = i64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
            *pos += 8;
            print!("(int) {v}");
        }
        TAG_DBL => {
            let v = f64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
            *pos += 8;
            print!("(dbl) {v}");
        }
        TAG_ARR => {
            let count = u32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
            *pos += 4;
            println!("(arr) len={count}");
            for _ in 0..count {
                print_reply(buf, pos);
                println!();
            }
            print!("(arr) end");
        }
        other => {
            // Unreachable for replies produced by this crate's encoder;
            // printed rather than panicking so a protocol mismatch is
            // visible instead of crashing the client.
            print!("(unknown tag {other})");
        }
    }
}
