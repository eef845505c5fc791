use std::future::Future;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use super::*;
use crate::args::{HttpMethod, PositiveUsize};
use crate::config::{RunConfig, STOP_GRACE_PERIOD};
use crate::target::Target;

const WORKER_TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Serves every request with `status_line`, plus `extra_headers`, and
/// forwards the raw request text to the returned receiver.
fn spawn_status_server(
    status_line: &'static str,
    extra_headers: &'static str,
) -> Result<(String, ServerHandle, mpsc::Receiver<String>), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let (request_tx, request_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    let request_tx = request_tx.clone();
                    thread::spawn(move || {
                        handle_client(stream, status_line, extra_headers, &request_tx);
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}/", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
        },
        request_rx,
    ))
}

fn handle_client(
    mut stream: TcpStream,
    status_line: &str,
    extra_headers: &str,
    request_tx: &mpsc::Sender<String>,
) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let _send_result = request_tx.send(request);
    let response = format!(
        "HTTP/1.1 {}\r\n{}Content-Length: 2\r\nConnection: close\r\n\r\nOK",
        status_line, extra_headers
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Reads the head and, when `Content-Length` is present, the whole body.
fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut received = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
        let read = stream.read(&mut buffer).ok()?;
        if read == 0 {
            return None;
        }
        received.extend_from_slice(buffer.get(..read)?);
        let text = String::from_utf8_lossy(&received).into_owned();
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            continue;
        };
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if body.len() >= content_length {
            return Some(text);
        }
    }
}

fn test_config(concurrency: usize, request_limit: Option<u64>) -> Result<RunConfig, String> {
    Ok(RunConfig {
        request_timeout: Some(Duration::from_secs(2)),
        disable_compression: false,
        disable_keepalive: true,
        disable_redirects: false,
        run_timeout: Duration::from_secs(10),
        stop_grace: STOP_GRACE_PERIOD,
        concurrency: PositiveUsize::try_from(concurrency).map_err(|err| err.to_string())?,
        request_limit,
    })
}

fn target(url: &str) -> Result<Target, String> {
    let url = Url::parse(url).map_err(|err| format!("bad url: {}", err))?;
    Ok(Target::new(HttpMethod::Get, url))
}

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

#[test]
fn stats_merge_and_totals() -> Result<(), String> {
    let mut left = WorkerStats::default();
    left.record_status(200);
    left.record_status(200);
    left.record_error("timeout: deadline".to_owned());
    let mut right = WorkerStats::default();
    right.record_status(500);
    right.record_status(200);
    right.record_error("timeout: deadline".to_owned());
    right.record_error("connect: refused".to_owned());
    left.merge(right);

    if left.status_codes.get(&200) != Some(&3) || left.status_codes.get(&500) != Some(&1) {
        return Err(format!("Unexpected status codes: {:?}", left.status_codes));
    }
    if left.total_responses() != 4 || left.total_errors() != 3 {
        return Err(format!(
            "Unexpected totals: {} responses, {} errors",
            left.total_responses(),
            left.total_errors()
        ));
    }
    let descriptions: Vec<&str> = left.errors.keys().map(String::as_str).collect();
    if descriptions != ["connect: refused", "timeout: deadline"] {
        return Err(format!("Errors not sorted: {:?}", descriptions));
    }
    Ok(())
}

#[test]
fn request_limit_completes_naturally() -> Result<(), String> {
    let (url, _server, _requests) = spawn_status_server("202 Accepted", "")?;
    run_async_test(async move {
        let mut worker = HttpWorker::new(target(&url)?, &test_config(2, Some(6))?)
            .map_err(|err| err.to_string())?;
        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;

        if stats.status_codes.get(&202) != Some(&6) {
            return Err(format!("Unexpected stats: {:?}", stats));
        }
        if stats.total_errors() != 0 {
            return Err(format!("Unexpected errors: {:?}", stats.errors));
        }
        Ok(())
    })
}

#[test]
fn stop_handle_ends_unbounded_worker() -> Result<(), String> {
    let (url, _server, _requests) = spawn_status_server("200 OK", "")?;
    run_async_test(async move {
        let mut worker = HttpWorker::new(target(&url)?, &test_config(1, None)?)
            .map_err(|err| err.to_string())?;
        let stop = worker.stop_handle();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stop.stop().await;
            stop.stop().await;
        });

        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker ignored stop: {}", err))?;
        stopper
            .await
            .map_err(|err| format!("stopper join failed: {}", err))?;

        if stats.total_responses() == 0 {
            return Err("Expected some responses before stop".to_owned());
        }
        if stats.status_codes.keys().any(|code| *code != 200) {
            return Err(format!("Unexpected codes: {:?}", stats.status_codes));
        }

        // stopping a finished worker is a no-op
        worker.stop_handle().stop().await;
        Ok(())
    })
}

#[test]
fn refused_connections_are_counted_as_errors() -> Result<(), String> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("addr failed: {}", err))?;
    drop(listener);

    run_async_test(async move {
        let mut worker = HttpWorker::new(
            target(&format!("http://{}/", addr))?,
            &test_config(1, Some(3))?,
        )
        .map_err(|err| err.to_string())?;
        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;

        if stats.total_responses() != 0 {
            return Err(format!("Unexpected responses: {:?}", stats.status_codes));
        }
        if stats.total_errors() != 3 {
            return Err(format!("Expected 3 errors, got {:?}", stats.errors));
        }
        if !stats.errors.keys().all(|description| description.starts_with("connect")) {
            return Err(format!("Expected connect errors, got {:?}", stats.errors));
        }
        Ok(())
    })
}

#[test]
fn zero_request_timeout_means_no_timeout() -> Result<(), String> {
    let (url, _server, _requests) = spawn_status_server("200 OK", "")?;
    run_async_test(async move {
        let config = RunConfig {
            request_timeout: None,
            ..test_config(1, Some(3))?
        };
        let mut worker =
            HttpWorker::new(target(&url)?, &config).map_err(|err| err.to_string())?;
        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;

        if stats.status_codes.get(&200) != Some(&3) || stats.total_errors() != 0 {
            return Err(format!("Unexpected stats: {:?}", stats));
        }
        Ok(())
    })
}

#[test]
fn target_body_reaches_the_server() -> Result<(), String> {
    let (url, _server, requests) = spawn_status_server("202 Accepted", "")?;
    let payload = "{\"metadata\":{\"service\":{\"name\":\"load\"}}}\n";
    run_async_test(async move {
        let url = Url::parse(&url)
            .and_then(|base| base.join("intake/v2/events"))
            .map_err(|err| format!("bad url: {}", err))?;
        let post = Target::new(HttpMethod::Post, url).with_body(Some(Bytes::from_static(
            payload.as_bytes(),
        )));
        let mut worker =
            HttpWorker::new(post, &test_config(1, Some(2))?).map_err(|err| err.to_string())?;
        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;
        if stats.status_codes.get(&202) != Some(&2) {
            return Err(format!("Unexpected stats: {:?}", stats));
        }
        Ok(())
    })?;

    let received: Vec<String> = requests.try_iter().collect();
    if received.len() != 2 {
        return Err(format!("Expected 2 requests, got {}", received.len()));
    }
    for request in &received {
        if !request.starts_with("POST /intake/v2/events HTTP/1.1\r\n") {
            return Err(format!("Unexpected request line: {}", request));
        }
        if !request.ends_with(&format!("\r\n\r\n{}", payload)) {
            return Err(format!("Body missing from request: {}", request));
        }
    }
    Ok(())
}

#[test]
fn disabled_redirects_record_the_redirect_status() -> Result<(), String> {
    let (url, _server, _requests) = spawn_status_server("302 Found", "Location: /elsewhere\r\n")?;
    run_async_test(async move {
        let no_redirects = RunConfig {
            disable_redirects: true,
            ..test_config(1, Some(2))?
        };
        let mut worker =
            HttpWorker::new(target(&url)?, &no_redirects).map_err(|err| err.to_string())?;
        let stats = tokio::time::timeout(WORKER_TEST_TIMEOUT, worker.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;
        if stats.status_codes.get(&302) != Some(&2) || stats.total_errors() != 0 {
            return Err(format!("Expected two 302 responses, got {:?}", stats));
        }

        let mut following =
            HttpWorker::new(target(&url)?, &test_config(1, Some(1))?).map_err(|err| err.to_string())?;
        let followed = tokio::time::timeout(WORKER_TEST_TIMEOUT, following.run())
            .await
            .map_err(|err| format!("worker did not finish: {}", err))?;
        if followed.total_responses() != 0
            || !followed.errors.keys().all(|description| description.starts_with("redirect"))
            || followed.total_errors() != 1
        {
            return Err(format!("Expected a redirect loop error, got {:?}", followed));
        }
        Ok(())
    })
}
