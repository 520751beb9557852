mod scripts;

use crate::*;
use futures::future::BoxFuture;
use rustc_hash::FxHashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

pub(crate) const ICON_URL: &str = "/icons/star.svg";
pub(crate) const ICON_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" id="star" class="icon" width="24" viewBox="0 0 24 24"><path class="shape" d="M12 2l3 7h7l-6 4 2 7-6-4-6 4 2-7-6-4h7z"/></svg>"#;

pub(crate) const SPRITE_URL: &str = "/icons/sprite.svg";
pub(crate) const SPRITE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
  <defs>
    <symbol id="home" viewBox="0 0 32 32"><path d="M0 16L16 0l16 16"/></symbol>
    <symbol id="gear" viewBox="0 0 20 20"><circle cx="10" cy="10" r="8"/></symbol>
  </defs>
</svg>"#;

pub(crate) const SCRIPTED_URL: &str = "/icons/animated.svg";
pub(crate) const SCRIPTED_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><style>.a{fill:red}</style><script>first()</script><g><script type="application/javascript">second()</script></g><circle class="a" r="4"/></svg>"#;

/// Resolves on its second poll, standing in for a network round trip.
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[derive(Default)]
pub(crate) struct MockFetcher {
    docs: Mutex<FxHashMap<String, std::result::Result<String, NetworkError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        let fetcher = Self::default();
        fetcher.set_doc(ICON_URL, ICON_SVG);
        fetcher.set_doc(SPRITE_URL, SPRITE_SVG);
        fetcher.set_doc(SCRIPTED_URL, SCRIPTED_SVG);
        fetcher
    }

    pub(crate) fn set_doc(&self, url: &str, body: &str) {
        self.docs
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.to_string()));
    }

    pub(crate) fn set_error(&self, url: &str, err: NetworkError) {
        self.docs.lock().unwrap().insert(url.to_string(), Err(err));
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    fn fetch_text<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, std::result::Result<String, NetworkError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(url.to_string());
            YieldNow::default().await;
            self.docs
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(NetworkError::with_status(404, "Not Found")))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Insertion {
    pub(crate) loader_id: u64,
    pub(crate) host: String,
    pub(crate) url: String,
    pub(crate) fallback: bool,
    pub(crate) via_component: bool,
    pub(crate) element: SvgElement,
    pub(crate) placement: Placement,
}

pub(crate) struct RecordingSink {
    supported: bool,
    inserted: Mutex<Vec<Insertion>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self {
            supported: true,
            inserted: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub(crate) fn insertions(&self) -> Vec<Insertion> {
        self.inserted.lock().unwrap().clone()
    }

    fn record(
        &self,
        ctx: &InsertionContext<'_>,
        host: &String,
        content: &SvgElement,
        placement: Placement,
        via_component: bool,
    ) {
        self.inserted.lock().unwrap().push(Insertion {
            loader_id: ctx.loader_id,
            host: host.clone(),
            url: ctx.url.to_string(),
            fallback: ctx.fallback,
            via_component,
            element: content.clone(),
            placement,
        });
    }
}

impl InsertionSink for RecordingSink {
    type Host = String;

    fn supports_inline_svg(&self) -> bool {
        self.supported
    }

    fn insert(
        &self,
        ctx: &InsertionContext<'_>,
        host: &String,
        content: &SvgElement,
        placement: Placement,
    ) {
        self.record(ctx, host, content, placement, false);
    }

    fn insert_via_component(
        &self,
        ctx: &InsertionContext<'_>,
        host: &String,
        content: &SvgElement,
        placement: Placement,
    ) {
        self.record(ctx, host, content, placement, true);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Inserted(String),
    Failed(LoadError),
    ScriptFailed(String, ScriptError),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn failures(&self) -> Vec<LoadError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Failed(err) => Some(err),
                _ => None,
            })
            .collect()
    }
}

impl LoadObserver for RecordingObserver {
    fn on_svg_inserted(&self, element: &SvgElement) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Inserted(element.to_markup()));
    }

    fn on_svg_failed(&self, error: &LoadError) {
        self.events.lock().unwrap().push(Event::Failed(error.clone()));
    }

    fn on_script_error(&self, url: &str, error: &ScriptError) {
        self.events
            .lock()
            .unwrap()
            .push(Event::ScriptFailed(url.to_string(), error.clone()));
    }
}

/// Records every script it is asked to run; fails scripts whose text contains `fail_on`.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
    fail_on: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub(crate) fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ScriptExecutor for RecordingExecutor {
    fn execute(&self, _url: &str, source: &str) -> std::result::Result<(), ScriptError> {
        self.executed.lock().unwrap().push(source.to_string());
        match &self.fail_on {
            Some(needle) if source.contains(needle.as_str()) => {
                Err(ScriptError::new(format!("ReferenceError: {needle} is not defined")))
            }
            _ => Ok(()),
        }
    }
}

pub(crate) struct Harness {
    pub(crate) fetcher: Arc<MockFetcher>,
    pub(crate) cache: Arc<SvgCache>,
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) observer: Arc<RecordingObserver>,
    pub(crate) scripts: Arc<RecordingExecutor>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_parts(RecordingSink::new(), RecordingExecutor::default())
    }

    pub(crate) fn with_parts(sink: RecordingSink, scripts: RecordingExecutor) -> Self {
        let fetcher = Arc::new(MockFetcher::new());
        Self {
            cache: Arc::new(SvgCache::new(fetcher.clone())),
            fetcher,
            sink: Arc::new(sink),
            observer: Arc::new(RecordingObserver::default()),
            scripts: Arc::new(scripts),
        }
    }

    pub(crate) fn loader(&self, host: &str) -> SvgLoader<RecordingSink> {
        SvgLoader::builder(self.cache.clone(), self.sink.clone(), host.to_string())
            .with_observer(self.observer.clone())
            .with_script_executor(self.scripts.clone())
            .build()
    }
}

pub(crate) fn request(url: &str) -> LoadRequest {
    LoadRequest::new(url)
}

pub(crate) fn request_with(url: &str, f: impl FnOnce(&mut InlineSvgOptions)) -> LoadRequest {
    let mut options = InlineSvgOptions::default();
    f(&mut options);
    LoadRequest::new(url).with_options(options)
}
