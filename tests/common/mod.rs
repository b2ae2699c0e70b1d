//! Shared fixtures: a scripted in-memory transport and RSS builders.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedsync::feed::{FetchError, Fetcher, Transport};
use feedsync::store::{ObservableStore, StateChange};
use feedsync::sync::SyncEngine;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// What the transport does for one URL.
#[derive(Debug, Clone)]
pub enum Script {
    Body(String),
    Status(u16),
    /// Answer with the body after a delay.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
}

/// In-memory transport whose responses can be changed between passes.
/// Unscripted URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_owned(), script);
    }

    pub fn serve(&self, url: &str, body: String) {
        self.script(url, Script::Body(body));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.to_owned());
        let script = self.scripts.lock().unwrap().get(url).cloned();
        match script {
            Some(Script::Body(body)) => Ok(body.into_bytes()),
            Some(Script::Status(code)) => Err(FetchError::HttpStatus(code)),
            Some(Script::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body.into_bytes())
            }
            Some(Script::Hang) => std::future::pending().await,
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}

pub fn engine(transport: &Arc<ScriptedTransport>) -> SyncEngine {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    SyncEngine::new(Fetcher::new(transport, FETCH_TIMEOUT))
}

/// An RSS document whose items link to `https://example.com/<title>`.
pub fn rss(channel_title: &str, titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| {
            format!(
                "    <item>\n      <title>{t}</title>\n      <link>https://example.com/{t}</link>\n      <description>About {t}</description>\n    </item>\n"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{channel_title}</title>\n    <link>https://example.com</link>\n    <description>{channel_title} feed</description>\n{items}  </channel>\n</rss>\n"
    )
}

/// Records the path of every store write.
pub fn record_paths(store: &mut ObservableStore) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |change: &StateChange<'_>| {
        sink.lock().unwrap().push(change.path().as_str());
    });
    seen
}

pub fn titles(store: &ObservableStore) -> Vec<String> {
    store.posts().iter().map(|p| p.title.clone()).collect()
}
