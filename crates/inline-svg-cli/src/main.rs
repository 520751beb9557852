use futures::executor::block_on;
use inline_svg::{
    EvalScripts, FileFetcher, InlineSvgOptions, InsertionContext, InsertionSink, LoadError,
    LoadObserver, LoadRequest, Placement, ScriptError, ScriptExecutor, SvgCache, SvgElement,
    SvgLoader,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Options(inline_svg::OptionsError),
    Json(serde_json::Error),
    LoadFailed(usize),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Options(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::LoadFailed(n) => write!(f, "{n} SVG load(s) failed"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<inline_svg::OptionsError> for CliError {
    fn from(value: inline_svg::OptionsError) -> Self {
        Self::Options(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Default)]
struct Args {
    urls: Vec<String>,
    config: Option<String>,
    base_dir: Option<String>,
    remove_attrs: Vec<String>,
    eval_scripts: Option<EvalScripts>,
    force_eval_styles: bool,
    no_cache: bool,
    fallback: Option<String>,
    component: bool,
    append: bool,
    prepend: bool,
    json: bool,
    out: Option<String>,
}

fn usage() -> &'static str {
    "inline-svg\n\
\n\
USAGE:\n\
  inline-svg [--config <options.json>] [--base-dir <dir>] [--remove-attr <name>]... [--eval-scripts always|once|never] [--force-eval-styles] [--no-cache] [--fallback <img-url>] [--component] [--append|--prepend] [--json] [--out <path>] <url>...\n\
\n\
NOTES:\n\
  - <url> is a local path or file:// URL; `sprite.svg#icon` extracts the `icon` symbol.\n\
  - --config reads inline SVG options as JSON (`cacheSVG`, `removeSVGAttributes`, ...);\n\
    flags given on the command line override it.\n\
  - Every URL is loaded concurrently through one shared cache.\n\
  - Markup is printed one element per line; --json prints placement details as well.\n\
  - Embedded scripts are stripped and listed on stderr, never executed.\n\
  - Set INLINE_SVG_LOG (e.g. `debug`) to see cache and load diagnostics on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--base-dir" => {
                let Some(dir) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.base_dir = Some(dir.clone());
            }
            "--remove-attr" => {
                let Some(name) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.remove_attrs.push(name.clone());
            }
            "--eval-scripts" => {
                let Some(policy) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.eval_scripts = Some(
                    policy
                        .parse::<EvalScripts>()
                        .map_err(|_| CliError::Usage(usage()))?,
                );
            }
            "--force-eval-styles" => args.force_eval_styles = true,
            "--no-cache" => args.no_cache = true,
            "--fallback" => {
                let Some(url) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.fallback = Some(url.clone());
            }
            "--component" => args.component = true,
            "--append" => args.append = true,
            "--prepend" => args.prepend = true,
            "--json" => args.json = true,
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--" => args.urls.extend(it.by_ref().cloned()),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            url => args.urls.push(url.to_string()),
        }
    }

    if args.urls.is_empty() || (args.append && args.prepend) {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn build_options(args: &Args) -> Result<InlineSvgOptions, CliError> {
    let mut options = match &args.config {
        Some(path) => InlineSvgOptions::from_json_str(&std::fs::read_to_string(path)?)?,
        None => InlineSvgOptions::default(),
    };
    options
        .remove_svg_attributes
        .extend(args.remove_attrs.iter().cloned());
    if let Some(policy) = args.eval_scripts {
        options.eval_scripts = policy;
    }
    if args.force_eval_styles {
        options.force_eval_styles = true;
    }
    if args.no_cache {
        options.cache_svg = false;
    }
    if let Some(fallback) = &args.fallback {
        options.fallback_img_url = Some(fallback.clone());
    }
    if args.component {
        options.inject_component = true;
    }
    if args.append || args.prepend {
        options.replace_contents = false;
        options.prepend = args.prepend;
    }
    Ok(options)
}

/// One inserted element, keyed by the position of its URL on the command line.
#[derive(Debug, Clone)]
struct Placed {
    slot: usize,
    url: String,
    fallback: bool,
    component: bool,
    placement: Placement,
    markup: String,
}

#[derive(Default)]
struct CollectingSink {
    placed: Mutex<Vec<Placed>>,
}

impl CollectingSink {
    fn record(
        &self,
        ctx: &InsertionContext<'_>,
        slot: usize,
        content: &SvgElement,
        placement: Placement,
        component: bool,
    ) {
        let mut placed = self.placed.lock().unwrap_or_else(|e| e.into_inner());
        if placement.replace_contents {
            placed.retain(|p| p.slot != slot);
        }
        let entry = Placed {
            slot,
            url: ctx.url.to_string(),
            fallback: ctx.fallback,
            component,
            placement,
            markup: content.to_markup(),
        };
        if placement.prepend {
            let at = placed.iter().position(|p| p.slot == slot).unwrap_or(placed.len());
            placed.insert(at, entry);
        } else {
            placed.push(entry);
        }
    }

    fn take_sorted(&self) -> Vec<Placed> {
        let mut placed =
            std::mem::take(&mut *self.placed.lock().unwrap_or_else(|e| e.into_inner()));
        placed.sort_by_key(|p| p.slot);
        placed
    }
}

impl InsertionSink for CollectingSink {
    type Host = usize;

    fn insert(
        &self,
        ctx: &InsertionContext<'_>,
        host: &usize,
        content: &SvgElement,
        placement: Placement,
    ) {
        self.record(ctx, *host, content, placement, false);
    }

    fn insert_via_component(
        &self,
        ctx: &InsertionContext<'_>,
        host: &usize,
        content: &SvgElement,
        placement: Placement,
    ) {
        self.record(ctx, *host, content, placement, true);
    }
}

struct StderrObserver;

impl LoadObserver for StderrObserver {
    fn on_svg_failed(&self, error: &LoadError) {
        eprintln!("error: {error}");
    }

    fn on_script_error(&self, url: &str, error: &ScriptError) {
        eprintln!("{url}: {error}");
    }
}

/// Lists stripped scripts instead of running them.
struct ListingScriptExecutor;

impl ScriptExecutor for ListingScriptExecutor {
    fn execute(&self, url: &str, source: &str) -> Result<(), ScriptError> {
        tracing::info!(url, bytes = source.len(), "skipping embedded script");
        eprintln!("{url}: script ({} bytes) not executed", source.len());
        Ok(())
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("INLINE_SVG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn placed_json(p: &Placed) -> Value {
    json!({
        "url": p.url,
        "fallback": p.fallback,
        "component": p.component,
        "replaceContents": p.placement.replace_contents,
        "prepend": p.placement.prepend,
        "markup": p.markup,
    })
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let options = build_options(&args)?;

    let mut fetcher = FileFetcher::new();
    if let Some(dir) = &args.base_dir {
        fetcher = fetcher.with_base_dir(dir);
    }
    let cache = Arc::new(SvgCache::new(Arc::new(fetcher)));
    let sink = Arc::new(CollectingSink::default());
    let observer: Arc<dyn LoadObserver> = Arc::new(StderrObserver);
    let scripts: Arc<dyn ScriptExecutor> = Arc::new(ListingScriptExecutor);

    let loaders: Vec<SvgLoader<CollectingSink>> = (0..args.urls.len())
        .map(|slot| {
            SvgLoader::builder(cache.clone(), sink.clone(), slot)
                .with_observer(observer.clone())
                .with_script_executor(scripts.clone())
                .build()
        })
        .collect();

    let outcomes = block_on(futures::future::join_all(
        loaders.iter().zip(&args.urls).map(|(loader, url)| {
            loader.load(LoadRequest::new(url.as_str()).with_options(options.clone()))
        }),
    ));
    let failed = outcomes
        .iter()
        .filter(|o| o.as_ref().is_none_or(|o| o.error().is_some()))
        .count();
    tracing::debug!(stats = ?cache.stats(), "cache statistics");

    let placed = sink.take_sorted();

    let text = if args.json {
        let values: Vec<Value> = placed.iter().map(placed_json).collect();
        let mut text = serde_json::to_string_pretty(&values)?;
        text.push('\n');
        text
    } else {
        let mut text = String::new();
        for p in &placed {
            text.push_str(&p.markup);
            text.push('\n');
        }
        text
    };
    write_text(&text, args.out.as_deref())?;

    if failed > 0 {
        return Err(CliError::LoadFailed(failed));
    }
    Ok(())
}

fn main() {
    init_tracing();

    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(()) => {}
        Err(err @ CliError::LoadFailed(_)) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
