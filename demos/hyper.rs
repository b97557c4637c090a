//! Serves an arbor router over HTTP/1 with hyper.
//!
//! ```text
//! cargo run --example hyper
//! curl localhost:3000/hello/ferris
//! curl -i -X OPTIONS localhost:3000/notes/1
//! curl localhost:3000/_routes
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbor::middleware::{AccessLog, Recover};
use arbor::{Context, RouteOptions, Router, RouterBuilder};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1::Builder as ConnectionBuilder;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

// Requests still running after this are cut off between middleware steps.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn hello(ctx: &mut Context) {
    let name = ctx.param("name").unwrap_or("world").to_owned();
    ctx.text(StatusCode::OK, &format!("Hello, {name}!"));
}

fn note(ctx: &mut Context) {
    let id = ctx.param("id").unwrap_or_default().to_owned();
    let result = ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
    if let Err(err) = result {
        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
    }
}

fn echo(ctx: &mut Context) {
    let body = ctx.body().to_vec();
    ctx.clear_response();
    ctx.write(&body);
}

fn router() -> Result<Router, arbor::InsertError> {
    let mut builder = RouterBuilder::new();
    builder.use_middleware(Recover).use_middleware(AccessLog);
    builder.document("/_routes");
    builder.get("/hello/{name}", hello);

    let notes = builder.group("/notes")?;
    notes.add_handler_with(
        Method::GET,
        "/{id}",
        note,
        RouteOptions::new().describe("fetch a note"),
    );
    notes.add_handler_with(
        Method::PUT,
        "/{id}",
        echo,
        RouteOptions::new().describe("echo the request body"),
    );

    builder.finalize()
}

async fn route(router: Arc<Router>, req: Request<Incoming>) -> hyper::Result<Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let request = Request::from_parts(parts, body.to_vec());

    let response = router.serve_with(request, |ctx| {
        ctx.set_deadline(Instant::now() + REQUEST_TIMEOUT);
    });

    Ok(response.map(|body| Full::new(Bytes::from(body))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let router = Arc::new(router()?);
    let listener = TcpListener::bind(("127.0.0.1", 3000)).await?;

    loop {
        let router = router.clone();
        let (tcp, _) = listener.accept().await?;
        tokio::task::spawn(async move {
            if let Err(err) = ConnectionBuilder::new()
                .serve_connection(
                    TokioIo::new(tcp),
                    hyper::service::service_fn(|request| route(router.clone(), request)),
                )
                .await
            {
                log::error!("error serving connection: {:?}", err);
            }
        });
    }
}
