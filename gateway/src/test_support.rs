use crate::config::Credentials;
use axum::Router;
use tokio::net::TcpListener;

pub fn test_credentials() -> Credentials {
    Credentials {
        consumer_key: "test-consumer".to_string(),
        consumer_secret: "test-consumer-secret".to_string(),
        token: "test-token".to_string(),
        token_secret: "test-token-secret".to_string(),
    }
}

/// Serves `router` on an ephemeral local port and returns its `/json` base URL
pub async fn spawn_upstream(router: Router) -> String {
    let addr = spawn(router).await;
    format!("http://{}/json", addr)
}

/// Serves `router` on an ephemeral local port and returns `host:port`
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr.to_string()
}
