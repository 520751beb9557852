use super::*;
use futures::executor::block_on;

fn with_policy(url: &str, policy: EvalScripts) -> LoadRequest {
    request_with(url, |o| o.eval_scripts = policy)
}

/// Loads `SCRIPTED_URL`, switches away, and loads it again.
fn load_scripted_twice(h: &Harness, policy: EvalScripts) {
    let loader = h.loader("#host");
    block_on(loader.load(with_policy(SCRIPTED_URL, policy)));
    block_on(loader.load(with_policy(ICON_URL, policy)));
    block_on(loader.load(with_policy(SCRIPTED_URL, policy)));
}

#[test]
fn always_runs_scripts_on_every_load() {
    let h = Harness::new();
    load_scripted_twice(&h, EvalScripts::Always);
    assert_eq!(
        h.scripts.executed(),
        ["first()", "second()", "first()", "second()"]
    );
}

#[test]
fn once_runs_scripts_on_the_first_load_only() {
    let h = Harness::new();
    load_scripted_twice(&h, EvalScripts::Once);
    assert_eq!(h.scripts.executed(), ["first()", "second()"]);
}

#[test]
fn once_is_tracked_per_loader() {
    let h = Harness::new();
    load_scripted_twice(&h, EvalScripts::Once);
    load_scripted_twice(&h, EvalScripts::Once);
    assert_eq!(h.scripts.executed().len(), 4);
}

#[test]
fn never_runs_scripts() {
    let h = Harness::new();
    load_scripted_twice(&h, EvalScripts::Never);
    assert!(h.scripts.executed().is_empty());
}

#[test]
fn scripts_are_stripped_under_every_policy() {
    for policy in [EvalScripts::Always, EvalScripts::Once, EvalScripts::Never] {
        let h = Harness::new();
        let loader = h.loader("#host");
        let outcome = block_on(loader.load(with_policy(SCRIPTED_URL, policy))).unwrap();
        let markup = outcome.element().unwrap().to_markup();
        assert!(!markup.contains("<script"), "{policy:?}: {markup}");
        assert!(markup.contains("<g/>"), "{policy:?}: {markup}");
        assert!(
            !h.sink.insertions()[0]
                .element
                .to_markup()
                .contains("<script")
        );
    }
}

#[test]
fn reload_counts_as_another_load() {
    let h = Harness::new();
    let loader = h.loader("#host");
    block_on(loader.load(with_policy(SCRIPTED_URL, EvalScripts::Always)));
    block_on(loader.reload());
    assert_eq!(h.scripts.executed().len(), 4);
}

#[test]
fn script_error_stops_remaining_scripts_but_keeps_content() {
    let h = Harness::with_parts(RecordingSink::new(), RecordingExecutor::failing_on("first"));
    let loader = h.loader("#host");
    let outcome = block_on(loader.load(request(SCRIPTED_URL))).unwrap();

    assert!(outcome.element().is_some());
    assert_eq!(h.scripts.executed(), ["first()"]);
    assert_eq!(h.sink.insertions().len(), 1);

    let events = h.observer.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Inserted(_)));
    assert_eq!(
        events[1],
        Event::ScriptFailed(
            SCRIPTED_URL.to_string(),
            ScriptError::new("ReferenceError: first is not defined")
        )
    );
    assert!(h.observer.failures().is_empty());
}

#[test]
fn failed_once_scripts_run_again_next_time() {
    let h = Harness::with_parts(RecordingSink::new(), RecordingExecutor::failing_on("second"));
    load_scripted_twice(&h, EvalScripts::Once);
    assert_eq!(
        h.scripts.executed(),
        ["first()", "second()", "first()", "second()"]
    );
}

#[test]
fn force_eval_styles_rewrites_style_text() {
    let h = Harness::new();
    let loader = h.loader("#host");
    let outcome = block_on(loader.load(request_with(SCRIPTED_URL, |o| {
        o.force_eval_styles = true;
    })))
    .unwrap();
    let el = outcome.element().unwrap();
    let style = el.find(&|e| e.name == "style").unwrap();
    assert_eq!(style.children, [SvgNode::Text(".a{fill:red}".to_string())]);
}
