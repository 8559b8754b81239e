//! HTTP server (`slang.net.httpServer`).
//!
//! Binds a listener once the port number arrives on the in-port and hands
//! every request to the environment through the `handler` delegate: the
//! request record is pushed out, the response record is pulled back in.
//! The listener is released when the operator stops.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use slang_core::{DelegateDef, OperatorDef, PortDef, Result, SlangError, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const HANDLER: &str = "handler";

/// Serves HTTP, delegating request handling to the surrounding graph.
///
/// # Ports
/// - in: `number` (port to bind)
/// - out: `string` (emitted on shutdown)
///
/// # Delegates
/// - `handler`: out `map{method: string, path: string, body: binary}`,
///   in `map{status: number, body: binary}`
pub struct HttpServerOp {
    template: OperatorDef,
}

impl HttpServerOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(PortDef::Number, PortDef::String).with_delegate(
                HANDLER,
                DelegateDef::new(
                    PortDef::map([
                        ("body", PortDef::Binary),
                        ("status", PortDef::Number),
                    ]),
                    PortDef::map([
                        ("body", PortDef::Binary),
                        ("method", PortDef::String),
                        ("path", PortDef::String),
                    ]),
                ),
            ),
        }
    }
}

impl Default for HttpServerOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for HttpServerOp {
    fn name(&self) -> &str {
        "slang.net.httpServer"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            let port_number = operator.main_in().pull().await?;
            let Some(port_number) = port_number.as_f64() else {
                return Err(SlangError::Worker {
                    operator: operator.name().to_string(),
                    cause: "port must be a number".to_string(),
                });
            };

            let addr = SocketAddr::from(([0, 0, 0, 0], port_number as u16));
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| SlangError::Worker {
                    operator: operator.name().to_string(),
                    cause: format!("failed to bind {}: {}", addr, e),
                })?;
            tracing::info!(operator = %operator.name(), %addr, "http server listening");

            loop {
                let (stream, remote_addr) = tokio::select! {
                    _ = operator.until_stopped() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(operator = %operator.name(), error = %e, "accept failed");
                            continue;
                        }
                    }
                };

                let io = TokioIo::new(stream);
                let service_operator = operator.clone();
                let service = service_fn(move |request: Request<Incoming>| {
                    let operator = service_operator.clone();
                    async move {
                        match handle_request(&operator, request).await {
                            Ok(response) => Ok::<_, hyper::Error>(response),
                            Err(err) => {
                                tracing::error!(operator = %operator.name(), error = %err, "handler failed");
                                Ok(Response::builder()
                                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                                    .body(Full::new(Bytes::new()))
                                    .unwrap())
                            }
                        }
                    }
                });

                // requests are serialized through the delegate pair, so
                // connections are served one at a time
                tokio::select! {
                    _ = operator.until_stopped() => break,
                    served = http1::Builder::new().serve_connection(io, service) => {
                        if let Err(e) = served {
                            tracing::debug!(operator = %operator.name(), remote_addr = %remote_addr, error = %e, "connection closed");
                        }
                    }
                }
            }

            tracing::info!(operator = %operator.name(), "http server stopped");
            operator.main_out().push(Value::from("stopped")).await.ok();
            Ok(())
        })
    }
}

/// Round-trip one request through the handler delegate.
async fn handle_request(
    operator: &Arc<Operator>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let handler = operator
        .delegate(HANDLER)
        .ok_or_else(|| SlangError::Worker {
            operator: operator.name().to_string(),
            cause: "handler delegate missing".to_string(),
        })?;

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let body = request
        .collect()
        .await
        .map_err(|e| SlangError::Worker {
            operator: operator.name().to_string(),
            cause: format!("failed to read request body: {}", e),
        })?
        .to_bytes();

    handler
        .output()
        .push(Value::object([
            ("body", Value::Binary(body)),
            ("method", Value::string(method)),
            ("path", Value::string(path)),
        ]))
        .await?;

    let response = handler.input().pull().await?;

    let status = response
        .get("status")
        .and_then(Value::as_f64)
        .unwrap_or(200.0) as u16;
    let body = match response.get("body") {
        Some(Value::Binary(bytes)) => bytes.clone(),
        Some(Value::String(text)) => Bytes::from(text.clone()),
        _ => Bytes::new(),
    };

    Ok(Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
        .body(Full::new(body))
        .unwrap())
}
