use callwire::{Envelope, RpcFunction, Server, Transport, Value};
use futures::future::{ready, Ready};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task;

#[derive(Debug, Error)]
#[error("user {0} not found")]
struct UserNotFound(i64);

struct UserDb {
    users: BTreeMap<i64, (String, i64)>,
}

impl UserDb {
    fn new() -> Self {
        let mut users = BTreeMap::new();
        users.insert(1, ("Ankur".to_owned(), 23i64));
        users.insert(9, ("Anand".to_owned(), 25));
        Self { users }
    }
}

impl RpcFunction for UserDb {
    type Args = (i64,);
    type Reply = Result<Value, UserNotFound>;
    type Fut = Ready<Self::Reply>;

    fn call(&self, (id,): (i64,)) -> Self::Fut {
        ready(match self.users.get(&id) {
            Some((name, age)) => {
                let mut user = BTreeMap::new();
                user.insert("name".to_owned(), Value::from(name.clone()));
                user.insert("age".to_owned(), Value::Int(*age));
                Ok(Value::Map(user))
            }
            None => Err(UserNotFound(id)),
        })
    }
}

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
    server.add("query_user", UserDb::new());
    task::spawn(server.serve("127.0.0.1:9091"));
    tokio::time::sleep(Duration::from_secs_f32(0.01)).await;

    let mut conn = Transport::new(TcpStream::connect("127.0.0.1:9091").await.unwrap());

    for id in [1i64, 9, 42] {
        let response = call(&mut conn, "query_user", vec![Value::Int(id)]).await;
        if response.is_err() {
            println!("query_user({id}) -> err: {}", response.err);
        } else {
            println!("query_user({id}) = {:?}", response.args);
        }
    }
}
