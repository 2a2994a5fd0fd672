use hyper::{Body, Request};
use rroute::{get_param, Limits, Router, Server};
use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    thread,
};

fn user(req: Request<Body>) -> String {
    format!("user {}", get_param(&req, "id"))
}

fn echo(body: String) -> String {
    body
}

fn spawn_server(app: Router) -> anyhow::Result<SocketAddr> {
    spawn_server_with(app, Limits::default())
}

fn spawn_server_with(app: Router, limits: Limits) -> anyhow::Result<SocketAddr> {
    let server = Server::bind("127.0.0.1:0", app)?.limits(limits);
    let addr = server.local_addr()?;

    thread::spawn(move || server.run());
    Ok(addr)
}

fn send(addr: SocketAddr, raw: &str) -> anyhow::Result<String> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(raw.as_bytes())?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

#[test]
fn test_serves_matched_route() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().get("/users/:id", user))?;

    let response = send(addr, "GET /users/42 HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.ends_with("\r\n\r\nuser 42"), "{}", response);

    Ok(())
}

#[test]
fn test_serves_not_found() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().get("/users/:id", user))?;

    let response = send(addr, "GET /users HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{}", response);

    Ok(())
}

#[test]
fn test_reads_body() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().post("/echo", echo))?;

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nhello world",
    )?;
    assert!(response.ends_with("\r\n\r\nhello world"), "{}", response);

    Ok(())
}

#[test]
fn test_reads_chunked_body() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().post("/echo", echo))?;

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    )?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.ends_with("\r\n\r\nhello world"), "{}", response);

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: gzip\r\n\r\n",
    )?;
    assert!(response.starts_with("HTTP/1.1 501 "), "{}", response);

    Ok(())
}

#[test]
fn test_rejects_oversize_requests() -> anyhow::Result<()> {
    let limits = Limits {
        max_head_size: 256,
        max_body_size: 16,
        ..Limits::default()
    };
    let addr = spawn_server_with(Router::default().post("/echo", echo), limits)?;

    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 1000000000\r\n\r\n",
    )?;
    assert!(response.starts_with("HTTP/1.1 413 "), "{}", response);

    let long_header = format!(
        "GET /echo HTTP/1.1\r\nHost: localhost\r\nX-Filler: {}\r\n\r\n",
        "a".repeat(1024)
    );
    let response = send(addr, &long_header)?;
    assert!(response.starts_with("HTTP/1.1 431 "), "{}", response);

    let response = send(addr, "GET\0 / HTTP/1.1\r\n\r\n")?;
    assert!(response.starts_with("HTTP/1.1 400 "), "{}", response);

    // within limits still served.
    let response = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\nok",
    )?;
    assert!(response.ends_with("\r\n\r\nok"), "{}", response);

    Ok(())
}

#[test]
fn test_unread_bytes_do_not_lose_response() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().post("/echo", echo))?;

    let mut raw = String::from("POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello");
    raw.push_str(&"x".repeat(64 * 1024));

    let response = send(addr, &raw)?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{}", response);
    assert!(response.ends_with("\r\n\r\nhello"), "{}", response);

    Ok(())
}

#[test]
fn test_concurrent_requests() -> anyhow::Result<()> {
    let addr = spawn_server(Router::default().get("/users/:id", user))?;

    let clients: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                send(
                    addr,
                    &format!("GET /users/{} HTTP/1.1\r\nHost: localhost\r\n\r\n", i),
                )
            })
        })
        .collect();

    for (i, client) in clients.into_iter().enumerate() {
        let response = client.join().expect("client thread panicked")?;
        assert!(response.ends_with(&format!("user {}", i)), "{}", response);
    }

    Ok(())
}

#[test]
fn test_bind_failure() -> anyhow::Result<()> {
    let taken = TcpListener::bind("127.0.0.1:0")?;
    let addr = taken.local_addr()?.to_string();

    let err = match Server::bind(&addr, Router::default()) {
        Ok(_) => panic!("second bind on {} should fail", addr),
        Err(e) => e,
    };
    assert!(err.to_string().contains("could not bind listener"));

    assert!(Router::default().start("not an address").is_err());

    Ok(())
}
