//! Load orchestration: cache → transforms → scripts → insertion, or failure → fallback.

use crate::cache::SvgCache;
use crate::document::SvgElement;
use crate::error::LoadError;
use crate::options::{EvalScripts, LoadRequest};
use crate::sink::{
    InsertionContext, InsertionSink, LoadObserver, NoopObserver, NoopScriptExecutor,
    ScriptExecutor,
};
use crate::source::SourceRequest;
use crate::transform;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Terminal result of one load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Inserted(SvgElement),
    Failed(LoadError),
}

impl LoadOutcome {
    pub fn element(&self) -> Option<&SvgElement> {
        match self {
            Self::Inserted(el) => Some(el),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Inserted(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Resolving,
    Transforming,
    ScriptEval,
    Inserted,
    Failed,
}

/// Element ready for insertion plus the scripts stripped from it.
struct Prepared {
    element: SvgElement,
    scripts: Vec<String>,
}

#[derive(Default)]
struct LoaderState {
    latest: Option<LoadRequest>,
    generation: u64,
    last_outcome: Option<LoadOutcome>,
    /// URLs whose scripts already ran under [`EvalScripts::Once`].
    ran_scripts: FxHashSet<String>,
    disposed: bool,
    unsupported: bool,
}

pub struct SvgLoaderBuilder<S: InsertionSink> {
    cache: Arc<SvgCache>,
    sink: Arc<S>,
    host: S::Host,
    observer: Arc<dyn LoadObserver>,
    scripts: Arc<dyn ScriptExecutor>,
}

impl<S: InsertionSink> SvgLoaderBuilder<S> {
    pub fn with_observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_script_executor(mut self, scripts: Arc<dyn ScriptExecutor>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Builds the loader. An insertion target without inline SVG support is reported once,
    /// here, and every later load is ignored.
    pub fn build(self) -> SvgLoader<S> {
        let unsupported = !self.sink.supports_inline_svg();
        if unsupported {
            let err = LoadError::UnsupportedEnvironment;
            tracing::warn!(error = %err, "inline SVG disabled");
            self.observer.on_svg_failed(&err);
        }
        SvgLoader {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            cache: self.cache,
            sink: self.sink,
            host: self.host,
            observer: self.observer,
            scripts: self.scripts,
            state: Mutex::new(LoaderState {
                unsupported,
                ..LoaderState::default()
            }),
        }
    }
}

/// Loads SVGs into one insertion host.
///
/// A loader tracks only its latest request: loading the URL it already holds is a no-op, and a
/// result that settles after a newer request (or after [`SvgLoader::dispose`]) is discarded
/// without reaching the sink or the observer.
pub struct SvgLoader<S: InsertionSink> {
    id: u64,
    cache: Arc<SvgCache>,
    sink: Arc<S>,
    host: S::Host,
    observer: Arc<dyn LoadObserver>,
    scripts: Arc<dyn ScriptExecutor>,
    state: Mutex<LoaderState>,
}

impl<S: InsertionSink> SvgLoader<S> {
    pub fn builder(cache: Arc<SvgCache>, sink: Arc<S>, host: S::Host) -> SvgLoaderBuilder<S> {
        SvgLoaderBuilder {
            cache,
            sink,
            host,
            observer: Arc::new(NoopObserver),
            scripts: Arc::new(NoopScriptExecutor),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> &S::Host {
        &self.host
    }

    /// URL of the latest request, if any.
    pub fn current_url(&self) -> Option<String> {
        self.lock_state().latest.as_ref().map(|r| r.url.clone())
    }

    /// Loads `request` and hands the result to the sink.
    ///
    /// Returns `None` when nothing was emitted: the attempt was superseded or the loader was
    /// disposed while it was in flight, the environment is unsupported, or the URL is unchanged
    /// and its previous attempt has not settled yet. An unchanged URL whose previous attempt
    /// settled returns that outcome again without touching the sink.
    pub async fn load(&self, request: LoadRequest) -> Option<LoadOutcome> {
        let generation = {
            let mut state = self.lock_state();
            if state.disposed || state.unsupported {
                return None;
            }
            if state.latest.as_ref().map(|r| r.url.as_str()) == Some(request.url.as_str()) {
                tracing::debug!(url = %request.url, "SVG URL unchanged; skipping load");
                return state.last_outcome.clone();
            }
            state.latest = Some(request.clone());
            state.last_outcome = None;
            state.generation += 1;
            state.generation
        };
        self.run(request, generation).await
    }

    /// Loads the latest request again, bypassing the unchanged-URL check.
    pub async fn reload(&self) -> Option<LoadOutcome> {
        let (request, generation) = {
            let mut state = self.lock_state();
            if state.disposed || state.unsupported {
                return None;
            }
            let request = state.latest.clone()?;
            state.last_outcome = None;
            state.generation += 1;
            (request, state.generation)
        };
        self.run(request, generation).await
    }

    /// Invalidates any in-flight attempt and forgets script history. Later loads are ignored.
    pub fn dispose(&self) {
        let mut state = self.lock_state();
        state.disposed = true;
        state.generation += 1;
        state.latest = None;
        state.last_outcome = None;
        state.ran_scripts.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    async fn run(&self, request: LoadRequest, generation: u64) -> Option<LoadOutcome> {
        let prepared = self.prepare(&request).await;
        if !self.is_current(generation) {
            tracing::debug!(url = %request.url, "discarding superseded SVG load");
            return None;
        }
        let outcome = match prepared {
            Ok(prepared) => self.insert(&request, prepared),
            Err(err) => self.fail(&request, err),
        };
        let mut state = self.lock_state();
        if state.generation == generation {
            state.last_outcome = Some(outcome.clone());
        }
        Some(outcome)
    }

    async fn prepare(&self, request: &LoadRequest) -> Result<Prepared, LoadError> {
        let options = &request.options;
        let source =
            SourceRequest::parse(&request.url, options.cache_svg).ok_or(LoadError::MissingUrl)?;

        trace_stage(&request.url, Stage::Resolving);
        let doc = self.cache.get(&source.url, source.use_cache).await?;
        let mut element = match &source.fragment_id {
            Some(fragment_id) => transform::extract_symbol(doc.root(), fragment_id)?,
            None => doc.clone_root(),
        };

        trace_stage(&request.url, Stage::Transforming);
        transform::remove_attributes(&mut element, &options.remove_svg_attributes);
        if let Some(hook) = &request.on_svg_loaded {
            element = hook(element).ok_or(LoadError::InvalidTransform)?;
        }

        trace_stage(&request.url, Stage::ScriptEval);
        let scripts = transform::strip_scripts(&mut element);
        if options.force_eval_styles {
            transform::force_style_reevaluation(&mut element);
        }
        Ok(Prepared { element, scripts })
    }

    fn insert(&self, request: &LoadRequest, prepared: Prepared) -> LoadOutcome {
        let Prepared { element, scripts } = prepared;
        let ctx = InsertionContext {
            loader_id: self.id,
            url: &request.url,
            fallback: false,
        };
        self.place(&ctx, request, &element);
        trace_stage(&request.url, Stage::Inserted);
        self.observer.on_svg_inserted(&element);
        self.eval_scripts(request, &scripts);
        LoadOutcome::Inserted(element)
    }

    /// Runs stripped scripts after insertion; a failing script stops the rest of this load's
    /// scripts but leaves the inserted content in place.
    fn eval_scripts(&self, request: &LoadRequest, scripts: &[String]) {
        if scripts.is_empty() {
            return;
        }
        let url = request.url.as_str();
        let policy = request.options.eval_scripts;
        let should_run = match policy {
            EvalScripts::Always => true,
            EvalScripts::Once => !self.lock_state().ran_scripts.contains(url),
            EvalScripts::Never => false,
        };
        if !should_run {
            tracing::trace!(url, ?policy, count = scripts.len(), "skipping SVG scripts");
            return;
        }
        for source in scripts {
            if let Err(err) = self.scripts.execute(url, source) {
                self.observer.on_script_error(url, &err);
                return;
            }
        }
        if policy == EvalScripts::Once {
            self.lock_state().ran_scripts.insert(url.to_string());
        }
    }

    fn fail(&self, request: &LoadRequest, err: LoadError) -> LoadOutcome {
        trace_stage(&request.url, Stage::Failed);
        tracing::warn!(url = %request.url, error = %err, "failed to load inline SVG");
        self.observer.on_svg_failed(&err);
        if let Some(fallback) = &request.options.fallback_img_url {
            let img = SvgElement::new("img").with_attr("src", fallback.as_str());
            let ctx = InsertionContext {
                loader_id: self.id,
                url: &request.url,
                fallback: true,
            };
            self.place(&ctx, request, &img);
        }
        LoadOutcome::Failed(err)
    }

    fn place(&self, ctx: &InsertionContext<'_>, request: &LoadRequest, content: &SvgElement) {
        let placement = request.options.placement();
        if request.options.inject_component {
            self.sink
                .insert_via_component(ctx, &self.host, content, placement);
        } else {
            self.sink.insert(ctx, &self.host, content, placement);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock_state();
        !state.disposed && state.generation == generation
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn trace_stage(url: &str, stage: Stage) {
    tracing::trace!(url, ?stage, "SVG load stage");
}
