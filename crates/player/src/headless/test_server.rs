//! Local HTTP server that hands out canned playlists.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

type Routes = Arc<Mutex<HashMap<String, VecDeque<(StatusCode, String)>>>>;

pub(crate) struct PlaylistServer {
    addr: SocketAddr,
    routes: Routes,
    task: JoinHandle<()>,
}

impl PlaylistServer {
    pub(crate) async fn start() -> Self {
        let routes = Routes::default();
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&routes));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, routes, task }
    }

    /// Responses for `path`, served in order. The last one repeats.
    pub(crate) fn route<'a>(&self, path: &str, responses: impl IntoIterator<Item = (u16, &'a str)>) {
        let queue = responses
            .into_iter()
            .map(|(status, body)| (StatusCode::from_u16(status).unwrap(), body.to_string()))
            .collect();
        self.routes.lock().insert(path.to_string(), queue);
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for PlaylistServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(State(routes): State<Routes>, uri: Uri) -> (StatusCode, String) {
    let mut routes = routes.lock();
    let Some(queue) = routes.get_mut(uri.path()) else {
        return (StatusCode::NOT_FOUND, String::new());
    };
    let next = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    next.unwrap_or((StatusCode::NOT_FOUND, String::new()))
}

/// Client that ignores proxy settings from the environment.
pub(crate) fn local_client() -> reqwest::Client {
    super::runtime::install_rustls_provider();
    reqwest::Client::builder().no_proxy().build().unwrap()
}
