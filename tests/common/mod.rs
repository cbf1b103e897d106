#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;

    /// Ensures the May runtime is configured only once per test binary.
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            apidispatch::logging::init();
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::time::Duration;

    /// Reserve a free localhost port for a test server.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test port");
        listener.local_addr().expect("local addr")
    }

    /// Minimal HTTP response for assertions.
    #[derive(Debug)]
    pub struct RawResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RawResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    fn find_blank_line(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Send a raw HTTP request and read one full response, relying on the
    /// server's Content-Length (the connection stays keep-alive).
    pub fn send_request(addr: SocketAddr, raw: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).expect("connect test server");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set read timeout");
        stream.write_all(raw.as_bytes()).expect("write request");

        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        loop {
            if let Some(pos) = find_blank_line(&buf) {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.trim()
                            .eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + content_length {
                    break;
                }
            }
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(_) => break,
            }
        }

        parse_response(&buf)
    }

    fn parse_response(buf: &[u8]) -> RawResponse {
        let pos = find_blank_line(buf).expect("complete response head");
        let head = String::from_utf8_lossy(&buf[..pos]).to_string();
        let body = String::from_utf8_lossy(&buf[pos + 4..]).to_string();

        let mut lines = head.lines();
        let status_line = lines.next().expect("status line");
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("status code");

        let headers = lines
            .filter_map(|l| {
                let (k, v) = l.split_once(':')?;
                Some((k.trim().to_string(), v.trim().to_string()))
            })
            .collect();

        RawResponse {
            status,
            headers,
            body,
        }
    }

    /// Convenience GET against a path.
    pub fn get(addr: SocketAddr, path: &str) -> RawResponse {
        send_request(
            addr,
            &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
        )
    }
}
