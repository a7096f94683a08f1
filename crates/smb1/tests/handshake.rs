//! Protocol tests against a scripted in-process server.
//!
//! The fake server speaks just enough NBSS/SMB1 to validate what the client
//! puts on the wire: the handshake sequence, MID/PID/UID/TID correlation,
//! the DELETE alignment pad, and directory listing assembly.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use smb1::{Client, ClientConfig, Connection, ConnectionState, Error};
use smb1_msg::header::Command;
use smb1_msg::{Request, SmbMsgError};
use smb1_transport::NetBiosName;

const SERVER_NAME: &str = "TESTSRV";
const UID: u16 = 0x0801;
const TID: u16 = 0x0502;

const STATUS_OBJECT_NAME_INVALID: u32 = 0xC0000033;

struct ParsedRequest {
    command: u8,
    tid: u16,
    pid: u16,
    uid: u16,
    mid: u16,
    words: Vec<u8>,
    data: Vec<u8>,
}

async fn read_frame(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let len = ((header[1] as usize & 1) << 16) | u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    Some((header[0], payload))
}

async fn write_frame(stream: &mut TcpStream, frame_type: u8, payload: &[u8]) {
    let mut frame = vec![frame_type, 0];
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await.unwrap();
}

fn parse_request(message: &[u8]) -> ParsedRequest {
    assert_eq!(&message[..4], b"\xffSMB", "request carries the SMB magic");
    let word_count = message[32] as usize;
    let words = message[33..33 + word_count * 2].to_vec();
    let bc_at = 33 + word_count * 2;
    let byte_count = u16::from_le_bytes([message[bc_at], message[bc_at + 1]]) as usize;
    let data = message[bc_at + 2..bc_at + 2 + byte_count].to_vec();
    ParsedRequest {
        command: message[4],
        tid: u16::from_le_bytes([message[24], message[25]]),
        pid: u16::from_le_bytes([message[26], message[27]]),
        uid: u16::from_le_bytes([message[28], message[29]]),
        mid: u16::from_le_bytes([message[30], message[31]]),
        words,
        data,
    }
}

fn build_response(
    request: &ParsedRequest,
    status: u32,
    uid: u16,
    tid: u16,
    words: &[u8],
    data: &[u8],
) -> Vec<u8> {
    build_response_with_mid(request, request.mid, status, uid, tid, words, data)
}

fn build_response_with_mid(
    request: &ParsedRequest,
    mid: u16,
    status: u32,
    uid: u16,
    tid: u16,
    words: &[u8],
    data: &[u8],
) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(b"\xffSMB");
    message.push(request.command);
    message.extend_from_slice(&status.to_le_bytes());
    message.push(0x98); // flags: reply
    message.extend_from_slice(&0xC841u16.to_le_bytes()); // flags2
    message.extend_from_slice(&[0u8; 12]); // pid high, signature, reserved
    message.extend_from_slice(&tid.to_le_bytes());
    message.extend_from_slice(&request.pid.to_le_bytes());
    message.extend_from_slice(&uid.to_le_bytes());
    message.extend_from_slice(&mid.to_le_bytes());
    message.push((words.len() / 2) as u8);
    message.extend_from_slice(words);
    message.extend_from_slice(&(data.len() as u16).to_le_bytes());
    message.extend_from_slice(data);
    message
}

fn negotiate_words() -> Vec<u8> {
    let mut words = Vec::new();
    words.extend_from_slice(&0u16.to_le_bytes()); // dialect index 0
    words.push(0x01); // user security
    words.extend_from_slice(&1u16.to_le_bytes()); // max mpx
    words.extend_from_slice(&1u16.to_le_bytes()); // max vcs
    words.extend_from_slice(&0x00011000u32.to_le_bytes()); // max buffer
    words.extend_from_slice(&0x00010000u32.to_le_bytes()); // max raw
    words.extend_from_slice(&0u32.to_le_bytes()); // session key
    words.extend_from_slice(&0x8000E3FCu32.to_le_bytes()); // capabilities
    words.extend_from_slice(&0u64.to_le_bytes()); // system time
    words.extend_from_slice(&0i16.to_le_bytes()); // time zone
    words.push(0); // challenge length
    words
}

/// One SMB_FIND_FILE_BOTH_DIRECTORY_INFO entry.
fn find_entry(name: &str, is_dir: bool, size: u64) -> Vec<u8> {
    let name_bytes: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let mut out = Vec::new();
    out.extend_from_slice(&0u32.to_le_bytes()); // next entry offset (patched)
    out.extend_from_slice(&0u32.to_le_bytes()); // file index
    out.extend_from_slice(&[0u8; 32]); // times
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(if is_dir { 0x10u32 } else { 0x20u32 }).to_le_bytes());
    out.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // ea size
    out.extend_from_slice(&[0u8; 2]); // short name length + reserved
    out.extend_from_slice(&[0u8; 24]); // short name
    out.extend_from_slice(&name_bytes);
    out
}

fn find_first_response(request: &ParsedRequest, entries: &[Vec<u8>]) -> Vec<u8> {
    let mut data_block = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let mut entry = entry.clone();
        if i + 1 != entries.len() {
            let len = entry.len() as u32;
            entry[..4].copy_from_slice(&len.to_le_bytes());
        }
        data_block.extend_from_slice(&entry);
    }

    // FIND_FIRST2 response parameters: SID, count, end-of-search, EA error
    // offset, last name offset.
    let mut t2_params = Vec::new();
    t2_params.extend_from_slice(&1u16.to_le_bytes());
    t2_params.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    t2_params.extend_from_slice(&1u16.to_le_bytes());
    t2_params.extend_from_slice(&0u16.to_le_bytes());
    t2_params.extend_from_slice(&0u16.to_le_bytes());

    // Trans2 response framing: 10 words, parameters right after ByteCount.
    let param_offset = 32 + 1 + 20 + 2;
    let data_offset = param_offset + t2_params.len();
    let mut words = Vec::new();
    words.extend_from_slice(&(t2_params.len() as u16).to_le_bytes());
    words.extend_from_slice(&(data_block.len() as u16).to_le_bytes());
    words.extend_from_slice(&0u16.to_le_bytes());
    words.extend_from_slice(&(t2_params.len() as u16).to_le_bytes());
    words.extend_from_slice(&(param_offset as u16).to_le_bytes());
    words.extend_from_slice(&0u16.to_le_bytes());
    words.extend_from_slice(&(data_block.len() as u16).to_le_bytes());
    words.extend_from_slice(&(data_offset as u16).to_le_bytes());
    words.extend_from_slice(&0u16.to_le_bytes());
    words.extend_from_slice(&[0, 0]); // setup count + reserved

    let mut data = t2_params;
    data.extend_from_slice(&data_block);
    build_response(request, 0, UID, TID, &words, &data)
}

/// Serves the NBSS handshake and the SMB connection sequence, then hands
/// every other command to `verbs`. Exits when the client closes the stream.
async fn serve<F>(listener: TcpListener, mut verbs: F)
where
    F: FnMut(&ParsedRequest) -> Vec<u8> + Send,
{
    let (mut stream, _) = listener.accept().await.unwrap();

    let (frame_type, _) = read_frame(&mut stream).await.unwrap();
    assert_eq!(frame_type, 0x81, "expected session request");
    write_frame(&mut stream, 0x82, &[]).await;

    while let Some((frame_type, payload)) = read_frame(&mut stream).await {
        assert_eq!(frame_type, 0x00, "expected session message");
        let request = parse_request(&payload);
        let response = match request.command {
            0x72 => {
                assert_eq!(request.tid, 0, "negotiate carries a zero TID");
                assert_eq!(request.uid, 0, "negotiate carries a zero UID");
                build_response(&request, 0, 0, 0, &negotiate_words(), &[])
            }
            0x73 => {
                // Session setup: the blob must open as a GSS-API token.
                assert_eq!(request.words.len(), 24);
                assert_eq!(request.data[0], 0x60);
                build_response(&request, 0, UID, 0, &[0xFF, 0, 0, 0, 0, 0, 0, 0], &[])
            }
            0x75 => {
                assert_eq!(request.uid, UID, "tree connect carries the granted UID");
                build_response(&request, 0, UID, TID, &[0xFF, 0, 0, 0, 0, 0], &[])
            }
            0x71 => build_response(&request, 0, request.uid, request.tid, &[], &[]),
            0x74 => build_response(&request, 0, request.uid, request.tid, &[0xFF, 0, 0, 0], &[]),
            _ => {
                assert_eq!(request.tid, TID, "verb carries the granted TID");
                assert_eq!(request.uid, UID, "verb carries the granted UID");
                verbs(&request)
            }
        };
        write_frame(&mut stream, 0x00, &response).await;
    }
}

async fn connected_client_on(port: u16) -> Client {
    let mut client = Client::with_config(
        Ipv4Addr::LOCALHOST,
        SERVER_NAME,
        ClientConfig {
            port,
            timeout: Duration::from_secs(1),
            ..ClientConfig::default()
        },
    );
    client.connect().await.unwrap();
    client
}

#[tokio::test]
async fn full_session_and_echo() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(serve(listener, |request| {
        assert_eq!(request.command, 0x2B);
        assert_eq!(request.words, [1, 0]);
        build_response(request, 0, request.uid, request.tid, &[1, 0], &request.data)
    }));

    let mut client = Client::with_config(
        Ipv4Addr::LOCALHOST,
        SERVER_NAME,
        ClientConfig {
            port,
            timeout: Duration::from_secs(1),
            ..ClientConfig::default()
        },
    );
    assert_eq!(client.state(), ConnectionState::Closed);
    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Ready);

    client.echo().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Ready);

    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    server.await.unwrap();
}

#[tokio::test]
async fn delete_carries_alignment_pad() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(serve(listener, |request| {
        assert_eq!(request.command, 0x06);
        // The quirk under test: BufferFormat tag, one pad byte, then the
        // UTF-16LE path starting at even offset 2 within the data block.
        assert_eq!(request.data[0], 0x04);
        assert_eq!(request.data[1], 0x00);
        let expected: Vec<u8> = "\\abc.bin"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert_eq!(&request.data[2..2 + expected.len()], &expected[..]);
        build_response(request, 0, request.uid, request.tid, &[], &[])
    }));

    let mut client = connected_client_on(port).await;
    client.delete("\\abc.bin").await.unwrap();
    client.close().await;
    server.await.unwrap();
}

/// A DELETE request without the alignment pad, as a conformant client
/// would send it. The scripted server rejects it the way the real one
/// does, proving the workaround is what makes deletes succeed.
struct UnpaddedDelete;

impl Request for UnpaddedDelete {
    const COMMAND: Command = Command::Delete;

    fn words(&self) -> Result<Vec<u8>, SmbMsgError> {
        Ok(0x0006u16.to_le_bytes().to_vec())
    }

    fn data(&self) -> Result<Vec<u8>, SmbMsgError> {
        let mut data = vec![0x04];
        data.extend("\\abc.bin".encode_utf16().flat_map(|u| u.to_le_bytes()));
        data.extend_from_slice(&[0, 0]);
        Ok(data)
    }
}

#[tokio::test]
async fn unpadded_delete_is_rejected_by_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (frame_type, _) = read_frame(&mut stream).await.unwrap();
        assert_eq!(frame_type, 0x81);
        write_frame(&mut stream, 0x82, &[]).await;

        let (_, payload) = read_frame(&mut stream).await.unwrap();
        let request = parse_request(&payload);
        assert_eq!(request.command, 0x06);
        let status = if request.data.get(1) == Some(&0x00) {
            0
        } else {
            STATUS_OBJECT_NAME_INVALID
        };
        let response = build_response(&request, status, 0, 0, &[], &[]);
        write_frame(&mut stream, 0x00, &response).await;
    });

    let addr = SocketAddr::new(addr.ip(), addr.port());
    let mut conn = Connection::open(addr, Duration::from_secs(1)).await.unwrap();
    let called = NetBiosName::file_server(SERVER_NAME).unwrap();
    let calling = NetBiosName::workstation("SDMC-RS").unwrap();
    conn.request_session(&called, &calling).await.unwrap();

    let err = conn
        .send_recv(&UnpaddedDelete)
        .await
        .unwrap()
        .expect_success()
        .unwrap_err();
    match err {
        Error::ServerStatus { status, .. } => assert_eq!(status, STATUS_OBJECT_NAME_INVALID),
        other => panic!("expected ServerStatus, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn listdir_filters_dot_entries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(serve(listener, |request| {
        assert_eq!(request.command, 0x32);
        let entries = vec![
            find_entry(".", true, 0),
            find_entry("..", true, 0),
            find_entry("Nintendo 3DS", true, 0),
            find_entry("DCIM", true, 0),
            find_entry("boot.firm", false, 250_000),
        ];
        find_first_response(request, &entries)
    }));

    let mut client = connected_client_on(port).await;
    let entries = client.listdir("\\").await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.name != "." && e.name != ".."));
    let dcim = entries.iter().find(|e| e.name == "DCIM").unwrap();
    assert!(dcim.is_dir);
    let firm = entries.iter().find(|e| e.name == "boot.firm").unwrap();
    assert!(!firm.is_dir);
    assert_eq!(firm.size, 250_000);
    client.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn mid_mismatch_closes_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(serve(listener, |request| {
        assert_eq!(request.command, 0x2B);
        build_response_with_mid(
            request,
            request.mid.wrapping_add(7),
            0,
            request.uid,
            request.tid,
            &[1, 0],
            &request.data,
        )
    }));

    let mut client = connected_client_on(port).await;
    let err = client.echo().await.unwrap_err();
    assert!(matches!(err, Error::MidMismatch { .. }), "got {err:?}");
    // Fatal protocol errors drop the connection to Closed; later verbs
    // fail with a state error without touching the network.
    assert_eq!(client.state(), ConnectionState::Closed);
    let err = client.listdir("\\").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }), "got {err:?}");
    drop(client);
    server.await.unwrap();
}

#[tokio::test]
async fn verbs_require_connect() {
    let mut client = Client::new(Ipv4Addr::LOCALHOST, SERVER_NAME);
    let err = client.listdir("\\").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    let err = client.echo().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
}

#[tokio::test]
async fn invalid_paths_never_reach_the_wire() {
    let mut client = Client::new(Ipv4Addr::LOCALHOST, SERVER_NAME);
    // Argument validation fires before the connection check would.
    for path in ["foo", "\\a/b", "\\..\\x", "", "\\a\0"] {
        let err = client.delete(path).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "path {path:?}");
    }
}
