use callwire::{Envelope, Server, Transport, Value};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task;

#[derive(Debug, Error)]
#[error("division by zero")]
struct DivideByZero;

async fn call(conn: &mut Transport<TcpStream>, name: &str, args: Vec<Value>) -> Envelope {
    let request = Envelope::request(name, args).encode().unwrap();
    conn.send(request).await.unwrap();
    let frame = conn.receive().await.unwrap().unwrap();
    Envelope::decode(&frame).unwrap()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut server = Server::new();
    server.register("add", |a: i64, b: i64| async move {
        Ok::<_, Infallible>(a + b)
    });
    server.register("divide", |a: i64, b: i64| async move {
        if b == 0 {
            Err(DivideByZero)
        } else {
            Ok(a / b)
        }
    });
    task::spawn(server.serve("127.0.0.1:9090"));
    tokio::time::sleep(Duration::from_secs_f32(0.01)).await;

    let mut conn = Transport::new(TcpStream::connect("127.0.0.1:9090").await.unwrap());

    for (a, b) in [(2i64, 3i64), (40, 2)] {
        let response = call(&mut conn, "add", vec![Value::Int(a), Value::Int(b)]).await;
        println!("add({a}, {b}) = {:?}", response.args);
    }

    let response = call(&mut conn, "divide", vec![Value::Int(1), Value::Int(0)]).await;
    println!("divide(1, 0) -> err: {}", response.err);
}
