use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

/// Largest request head the test server accepts.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// How the test server treats a connection after answering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Answer with `Connection: close` and hang up.
    Close,
    /// Keep serving requests on the same connection.
    KeepAlive,
}

pub struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
    recorded: Arc<Recorded>,
}

#[derive(Default)]
struct Recorded {
    heads: Mutex<Vec<String>>,
    tunnels: Mutex<Vec<String>>,
}

impl ServerHandle {
    /// Request heads (request line plus headers) received so far, exactly
    /// as sent. Requests that arrived through a tunnel are included.
    pub fn heads(&self) -> Vec<String> {
        self.recorded
            .heads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `CONNECT` request heads received so far.
    pub fn tunnels(&self) -> Vec<String> {
        self.recorded
            .tunnels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a lightweight HTTP server that answers every request with `status`,
/// closes each connection after one response and records each request head.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_recording_server(status: u16) -> Result<(String, ServerHandle), String> {
    spawn_server(status, ConnectionMode::Close)
}

/// Spawn a recording server that also accepts `CONNECT` and then serves the
/// tunnelled requests itself.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_server(status: u16, mode: ConnectionMode) -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let recorded = Arc::new(Recorded::default());
    let shared = Arc::clone(&recorded);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let shared = Arc::clone(&shared);
                    thread::spawn(move || handle_client(stream, status, mode, &shared));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
            recorded,
        },
    ))
}

/// Like [`spawn_recording_server`], but skips when sockets are not allowed.
///
/// # Errors
///
/// Returns an error if the server fails for any other reason.
pub fn spawn_recording_server_or_skip(
    status: u16,
) -> Result<Option<(String, ServerHandle)>, String> {
    spawn_server_or_skip(status, ConnectionMode::Close)
}

/// Like [`spawn_server`], but skips when sockets are not allowed.
///
/// # Errors
///
/// Returns an error if the server fails for any other reason.
pub fn spawn_server_or_skip(
    status: u16,
    mode: ConnectionMode,
) -> Result<Option<(String, ServerHandle)>, String> {
    match spawn_server(status, mode) {
        Ok(result) => Ok(Some(result)),
        Err(err) if err.contains("Operation not permitted") => {
            eprintln!("Skipping e2e test: {}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Returns a loopback port with nothing listening on it.
///
/// # Errors
///
/// Returns an error if a throwaway listener cannot be bound.
pub fn closed_port() -> Result<u16, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind listener failed: {}", err))?;
    let port = listener
        .local_addr()
        .map_err(|err| format!("listener addr failed: {}", err))?
        .port();
    drop(listener);
    Ok(port)
}

fn handle_client(mut stream: TcpStream, status: u16, mode: ConnectionMode, recorded: &Recorded) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    drop(stream.set_read_timeout(Some(Duration::from_secs(5))));

    let mut received = Vec::new();
    loop {
        let Some(head) = read_head(&mut stream, &mut received) else {
            return;
        };
        if head.starts_with("CONNECT ") {
            recorded
                .tunnels
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(head);
            if stream
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                .is_err()
            {
                return;
            }
            continue;
        }

        if !skip_body(&mut stream, &mut received, content_length(&head)) {
            return;
        }
        recorded
            .heads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(head);

        let connection = match mode {
            ConnectionMode::Close => "close",
            ConnectionMode::KeepAlive => "keep-alive",
        };
        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: 2\r\nConnection: {}\r\n\r\nOK",
            status, connection
        );
        if stream.write_all(response.as_bytes()).is_err() || stream.flush().is_err() {
            return;
        }
        if mode == ConnectionMode::Close {
            drop(stream.shutdown(Shutdown::Both));
            return;
        }
    }
}

/// Reads up to the end of the next request head and removes it from
/// `received`. Bytes past the head stay buffered.
fn read_head(stream: &mut TcpStream, received: &mut Vec<u8>) -> Option<String> {
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find_head_end(received) {
            break pos;
        }
        if received.len() > MAX_HEAD_BYTES {
            return None;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return None,
            Ok(read) => received.extend_from_slice(chunk.get(..read).unwrap_or_default()),
        }
    };
    let head = String::from_utf8_lossy(received.get(..head_end).unwrap_or_default()).into_owned();
    received.drain(..head_end.saturating_add(4));
    Some(head)
}

fn skip_body(stream: &mut TcpStream, received: &mut Vec<u8>, len: usize) -> bool {
    let mut chunk = [0u8; 4096];
    while received.len() < len {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return false,
            Ok(read) => received.extend_from_slice(chunk.get(..read).unwrap_or_default()),
        }
    }
    received.drain(..len);
    true
}

fn find_head_end(received: &[u8]) -> Option<usize> {
    received.windows(4).position(|window| window == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Run the `trafficgen` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_trafficgen<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = trafficgen_bin()?;
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .map_err(|err| format!("run trafficgen failed: {}", err))
}

fn trafficgen_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_trafficgen").map_or_else(
        || Err("CARGO_BIN_EXE_trafficgen missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
