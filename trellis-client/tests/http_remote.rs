//! HttpRemote against a one-shot local HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use trellis_client::HttpRemote;
use trellis_core::{BlockPatch, Credentials, RemoteError, RemoteState, SiteId};

/// What the server saw.
#[derive(Debug)]
struct Recorded {
    request_line: String,
    authorization: Option<String>,
    body: String,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Serve exactly one request with `status` and `response_body`.
fn serve_once(status: u16, response_body: &'static str) -> (HttpRemote, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");

        let mut authorization = None;
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("header");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().expect("length"),
                    "authorization" => authorization = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("body");

        write!(
            stream,
            "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
            response_body.len()
        )
        .expect("respond");

        Recorded {
            request_line: request_line.trim_end().to_string(),
            authorization,
            body: String::from_utf8(body).expect("utf8 body"),
        }
    });

    let remote = HttpRemote::new(&Credentials {
        api_url: format!("http://{addr}/api/"),
        api_token: "t0k".into(),
    })
    .expect("valid api url");
    (remote, handle)
}

#[test]
fn get_blocks_sends_bearer_token_and_unwraps_envelope() {
    init_tracing();
    let (remote, server) = serve_once(
        200,
        r#"{"data": [{"_id": "b1", "name": "Hero", "template": "<h1>", "fields": []}]}"#,
    );

    let blocks = remote.get_blocks(&SiteId::from("s1")).expect("blocks");
    let seen = server.join().expect("server");

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, "b1");
    assert_eq!(seen.request_line, "GET /api/sites/s1/blocks HTTP/1.1");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer t0k"));
}

#[test]
fn update_block_patches_only_given_properties() {
    init_tracing();
    let (remote, server) = serve_once(200, "{}");
    let patch = BlockPatch {
        template: Some("<h2>".into()),
        ..BlockPatch::default()
    };

    remote
        .update_block(&SiteId::from("s1"), "b1", &patch)
        .expect("update");
    let seen = server.join().expect("server");

    assert_eq!(seen.request_line, "PATCH /api/sites/s1/blocks/b1 HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&seen.body).expect("json body");
    assert_eq!(body, serde_json::json!({"template": "<h2>"}));
}

#[test]
fn non_2xx_becomes_typed_api_error() {
    init_tracing();
    let (remote, server) = serve_once(
        409,
        r#"{"message": "block name already exists", "code": "DUPLICATE_NAME"}"#,
    );

    let err = remote.delete_block(&SiteId::from("s1"), "b1").unwrap_err();
    server.join().expect("server");

    match err {
        RemoteError::Api {
            status,
            message,
            code,
        } => {
            assert_eq!(status, 409);
            assert_eq!(message, "block name already exists");
            assert_eq!(code.as_deref(), Some("DUPLICATE_NAME"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let remote = HttpRemote::new(&Credentials {
        api_url: format!("http://{addr}"),
        api_token: "t0k".into(),
    })
    .expect("valid api url");
    let err = remote.get_site(&SiteId::from("s1")).unwrap_err();
    assert!(matches!(err, RemoteError::Transport { .. }), "got {err}");
}

#[test]
fn unusable_api_url_is_rejected_before_any_request() {
    let err = HttpRemote::new(&Credentials {
        api_url: "cms.example.com/api".into(),
        api_token: "t0k".into(),
    })
    .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidUrl { .. }), "got {err}");
    assert!(err.to_string().contains("cms.example.com/api"));
}
