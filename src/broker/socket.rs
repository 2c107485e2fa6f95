//! axum WebSocket endpoint feeding [`run_connection`].

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{future, SinkExt, StreamExt};
use log::info;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use super::{run_connection, BrokerRegistry, Frame};

/// Header carrying the authenticated user id, set by the session layer.
pub const USER_HEADER: &str = "x-user-id";

/// Requests that do not complete within `request_timeout` get a 408. An upgraded
/// socket runs outside the request and is bounded by its own read deadline.
pub fn router(registry: BrokerRegistry, request_timeout: Duration) -> Router {
    Router::new()
        .route("/ws", get(upgrade))
        .with_state(registry)
        .layer(TimeoutLayer::new(request_timeout))
}

pub fn user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

async fn upgrade(ws: WebSocketUpgrade, State(registry): State<BrokerRegistry>, headers: HeaderMap) -> Response {
    let Some(user_id) = user_id(&headers) else {
        return (StatusCode::UNAUTHORIZED, "missing user").into_response();
    };
    ws.on_upgrade(move |socket| serve(registry, user_id, socket))
}

async fn serve(registry: BrokerRegistry, user_id: i64, socket: WebSocket) {
    info!("User {} connected", user_id);
    let (broker, outbound) = registry.register(user_id);
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_ws(frame))));
    let stream = stream.filter_map(|message| {
        future::ready(match message {
            Ok(message) => from_ws(message).map(Ok),
            Err(err) => Some(Err(err)),
        })
    });
    run_connection(registry, broker, outbound, sink, stream).await;
}

fn to_ws(frame: Frame) -> WsMessage {
    match frame {
        Frame::Text(text) => WsMessage::Text(text),
        Frame::Ping => WsMessage::Ping(Vec::new()),
        Frame::Pong => WsMessage::Pong(Vec::new()),
        Frame::Close => WsMessage::Close(None),
    }
}

fn from_ws(message: WsMessage) -> Option<Frame> {
    match message {
        WsMessage::Text(text) => Some(Frame::Text(text)),
        WsMessage::Binary(_) => None,
        WsMessage::Ping(_) => Some(Frame::Ping),
        WsMessage::Pong(_) => Some(Frame::Pong),
        WsMessage::Close(_) => Some(Frame::Close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use tower::ServiceExt;

    #[test]
    fn test_user_id_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_id(&headers), None);

        headers.insert(USER_HEADER, HeaderValue::from_static(" 42 "));
        assert_eq!(user_id(&headers), Some(42));

        headers.insert(USER_HEADER, HeaderValue::from_static("admin"));
        assert_eq!(user_id(&headers), None);
    }

    #[test]
    fn test_frame_mapping() {
        assert_eq!(from_ws(to_ws(Frame::Text("hi".into()))), Some(Frame::Text("hi".into())));
        assert_eq!(from_ws(WsMessage::Ping(vec![1])), Some(Frame::Ping));
        assert_eq!(from_ws(WsMessage::Binary(vec![1])), None);
        assert!(matches!(to_ws(Frame::Close), WsMessage::Close(None)));
    }

    #[tokio::test]
    async fn test_router_rejects_plain_request() {
        let app = router(BrokerRegistry::new(), Duration::from_secs(15));
        let request = Request::builder()
            .uri("/ws")
            .header(USER_HEADER, "1")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_router_unknown_path() {
        let app = router(BrokerRegistry::new(), Duration::from_secs(15));
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
