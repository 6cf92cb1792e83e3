//! HTTP behaviour of the endoflife.date source against a throwaway server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use version_gate::{EndOfLifeSource, ErrorKind, SupportSource};

const PAYLOAD: &str = r#"{
  "schema_version": "1.2.0",
  "result": {
    "name": "amazon-eks",
    "releases": [
      {"name": "1.34", "isEol": false},
      {"name": "1.33", "isEol": false},
      {"name": "1.32", "isEol": false},
      {"name": "1.31", "isEol": true}
    ]
  }
}"#;

/// Answer exactly one request with `status` and `body`, returning the
/// request head the client sent.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/v1/products/amazon-eks", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());
        String::from_utf8_lossy(&request).into_owned()
    });

    (url, handle)
}

/// Accept one connection and never answer; the socket stays open for `hold`.
fn serve_hanging(hold: Duration) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/v1/products/amazon-eks", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        std::thread::sleep(hold);
        drop(stream);
    });

    (url, handle)
}

// =============================================================================
// Responses
// =============================================================================

mod response_tests {
    use super::*;

    #[test]
    fn test_supported_versions_from_api() {
        let (url, server) = serve_once("200 OK", PAYLOAD);
        let source = EndOfLifeSource::new(url, Duration::from_secs(5));

        let set = source.fetch_supported_versions().unwrap();
        assert_eq!(set.joined(), "1.32, 1.33, 1.34");

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /api/v1/products/amazon-eks "));
        assert!(request.to_ascii_lowercase().contains("user-agent: version-gate/"));
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let (url, server) = serve_once("500 Internal Server Error", "{}");
        let err = EndOfLifeSource::new(url, Duration::from_secs(5))
            .fetch_supported_versions()
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_html_body_is_format_error() {
        let (url, server) = serve_once("200 OK", "<html>maintenance</html>");
        let err = EndOfLifeSource::new(url, Duration::from_secs(5))
            .fetch_supported_versions()
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), ErrorKind::SourceFormatError);
    }

    #[test]
    fn test_all_releases_eol_is_empty_result() {
        let (url, server) = serve_once("200 OK", r#"[{"name": "1.28", "isEol": true}]"#);
        let err = EndOfLifeSource::new(url, Duration::from_secs(5))
            .fetch_supported_versions()
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), ErrorKind::EmptyResultError);
    }
}

// =============================================================================
// Transport
// =============================================================================

mod transport_tests {
    use super::*;

    #[test]
    fn test_connection_refused_is_unavailable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/api/v1/products/amazon-eks", port);

        let err = EndOfLifeSource::new(url, Duration::from_secs(2))
            .fetch_supported_versions()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    #[test]
    fn test_silent_server_times_out() {
        let (url, server) = serve_hanging(Duration::from_secs(3));
        let started = Instant::now();

        let err = EndOfLifeSource::new(url, Duration::from_millis(200))
            .fetch_supported_versions()
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
        server.join().unwrap();
    }
}
