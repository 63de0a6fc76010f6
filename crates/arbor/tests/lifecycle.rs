mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor::core::{Host, NodeHandle};
use arbor::prelude::*;
use arbor::{RootError, RuntimeError};
use pretty_assertions::assert_eq;

use common::{body_html, click, mount};

#[derive(Default)]
struct Counts {
    mounted: Cell<usize>,
    unmounted: Cell<usize>,
    destroyed: Cell<usize>,
}

fn tracked(counts: &Rc<Counts>) -> RenderResult {
    let (count, set_count) = use_state(|| 0);
    let effect_counts = counts.clone();
    use_effect_cleanup(
        move || {
            effect_counts.mounted.set(effect_counts.mounted.get() + 1);
            move || effect_counts.unmounted.set(effect_counts.unmounted.get() + 1)
        },
        (),
    );
    let lifetime_counts = counts.clone();
    use_lifetime_effect(
        || move || lifetime_counts.destroyed.set(lifetime_counts.destroyed.get() + 1),
        (),
    );
    Ok(h("button")
        .attr("id", "bump")
        .on("click", move || set_count.update(|n| *n += 1))
        .child(count)
        .into())
}

fn dynamic_host(props: &(bool, Rc<Counts>)) -> RenderResult {
    let (show, counts) = props.clone();
    Ok(h("div")
        .child(show.then(|| component(tracked, counts).key("x").lifetime(Lifetime::Dynamic)))
        .into())
}

fn view_dynamic(show: bool, counts: &Rc<Counts>) -> Element {
    component(dynamic_host, (show, counts.clone())).into()
}

#[test]
fn dynamic_instances_do_not_survive_omission() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(view_dynamic(true, &counts)).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "bump");
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<div><button id="bump">1</button></div>"#);

    root.render(view_dynamic(false, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(counts.unmounted.get(), 1);
    assert_eq!(counts.destroyed.get(), 1);

    root.render(view_dynamic(true, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<div><button id="bump">0</button></div>"#);
    assert_eq!(counts.mounted.get(), 2);
}

fn static_shell(counts: &Rc<Counts>) -> RenderResult {
    Ok(h("section")
        .child(component(tracked, counts.clone()).lifetime(Lifetime::Static))
        .into())
}

fn view_shell(counts: &Rc<Counts>) -> Element {
    component(static_shell, counts.clone())
        .lifetime(Lifetime::Dynamic)
        .into()
}

#[test]
fn static_instances_outlive_their_structural_parent() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(view_shell(&counts)).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "bump");
    root.run_until_idle().unwrap();

    // Every root render builds a new dynamic shell around the same
    // static child.
    root.render(view_shell(&counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<section><button id="bump">1</button></section>"#);
    assert_eq!(counts.mounted.get(), 1);
    assert_eq!(counts.destroyed.get(), 0);
    assert_eq!(doc.borrow().elements_by_tag("section").len(), 1);
}

struct FlagProps {
    show_middle: bool,
    counts: Rc<Counts>,
}

fn middle(props: &(LifetimeFlag, Rc<Counts>)) -> RenderResult {
    let (flag, counts) = props.clone();
    Ok(h("p").child(component(tracked, counts).lifetime(flag)).into())
}

fn flag_owner(props: &FlagProps) -> RenderResult {
    let flag = use_lifetime_flag();
    Ok(h("div")
        .child(
            props
                .show_middle
                .then(|| component(middle, (flag, props.counts.clone())).lifetime(Lifetime::Dynamic)),
        )
        .into())
}

fn view_flag(show_middle: bool, counts: &Rc<Counts>) -> Element {
    component(
        flag_owner,
        FlagProps {
            show_middle,
            counts: counts.clone(),
        },
    )
    .into()
}

#[test]
fn flag_lifetimes_follow_the_flag_owner() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(view_flag(true, &counts)).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "bump");
    root.run_until_idle().unwrap();

    // The dynamic middle is destroyed, the flagged child is only hidden.
    root.render(view_flag(false, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), "<div></div>");
    assert_eq!(counts.destroyed.get(), 0);

    root.render(view_flag(true, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<div><p><button id="bump">1</button></p></div>"#);

    root.unmount().unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(counts.destroyed.get(), 1);
}

fn many(props: &(usize, Rc<Counts>)) -> RenderResult {
    let (n, counts) = props.clone();
    Ok(h("ul")
        .children((0..n).map(|i| component(tracked, counts.clone()).key(i as i64)))
        .into())
}

fn view_many(n: usize, counts: &Rc<Counts>) -> Element {
    component(many, (n, counts.clone())).into()
}

#[test]
fn mount_and_unmount_effects_balance() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(view_many(3, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(counts.mounted.get(), 3);

    root.render(view_many(1, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(counts.unmounted.get(), 2);
    assert_eq!(counts.destroyed.get(), 0);

    root.unmount().unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(counts.mounted.get(), counts.unmounted.get());
    assert_eq!(counts.destroyed.get(), 3);
    assert_eq!(body_html(&doc), "");
    assert!(matches!(root.unmount(), Err(RootError::TornDown)));
}

fn rebuildable(counts: &Rc<Counts>) -> RenderResult {
    let rebuild = use_rebuild();
    let inner = tracked(counts)?;
    Ok(fragment()
        .child(inner)
        .child(h("button").attr("id", "rebuild").on("click", move || rebuild.rebuild()))
        .into())
}

#[test]
fn rebuild_discards_hook_state() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(component(rebuildable, counts.clone())).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "bump");
    root.run_until_idle().unwrap();
    assert_eq!(doc.borrow().text_content(doc.borrow().body()), "1");

    click(&doc, "rebuild");
    root.run_until_idle().unwrap();
    assert_eq!(doc.borrow().text_content(doc.borrow().body()), "0");
    assert_eq!(counts.mounted.get(), 2);
    assert_eq!(counts.unmounted.get(), 1);
    assert_eq!(counts.destroyed.get(), 1);
}

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct Boom;

fn failing(_: &()) -> RenderResult {
    Err(Boom.into())
}

fn failing_parent(_: &()) -> RenderResult {
    let (_, _) = use_state(|| "partial state");
    Ok(h("div").child(component(failing, ())).into())
}

fn boundary(calls: &Rc<Cell<usize>>) -> RenderResult {
    let calls = calls.clone();
    use_error_handler(move |_: &Boom| calls.set(calls.get() + 1));
    Ok(h("section").child(component(failing_parent, ())).into())
}

#[test]
fn grandparent_handler_receives_the_error_once() {
    let (doc, root) = mount();
    let calls = Rc::new(Cell::new(0));
    root.render(component(boundary, calls.clone())).unwrap();
    root.run_until_idle().unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(body_html(&doc), "<section></section>");
    assert!(!root.is_torn_down());
    let snapshot = root.snapshot().expect("tree is live");
    assert!(snapshot.find("boundary").is_some());
    assert!(snapshot.find("failing_parent").is_none());
    assert!(snapshot.find("failing").is_none());
}

fn unrelated_handler(calls: &Rc<Cell<usize>>) -> RenderResult {
    #[derive(Debug, thiserror::Error)]
    #[error("other")]
    struct Other;

    let calls = calls.clone();
    use_error_handler(move |_: &Other| calls.set(calls.get() + 1));
    Ok(h("section").child(component(failing_parent, ())).into())
}

#[test]
fn unhandled_errors_tear_the_root_down() {
    let (doc, root) = mount();
    let calls = Rc::new(Cell::new(0));
    root.render(component(unrelated_handler, calls.clone())).unwrap();

    let error = root.run_until_idle().unwrap_err();
    match error {
        RuntimeError::Unhandled {
            error,
            component_stack,
        } => {
            assert!(error.downcast_ref::<Boom>().is_some());
            assert_eq!(
                component_stack.names(),
                vec!["failing", "failing_parent", "unrelated_handler", "Root"]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.get(), 0);
    assert!(root.is_torn_down());
    assert_eq!(body_html(&doc), "");
    assert!(matches!(root.render("again"), Err(RootError::TornDown)));
    // The fatal error is reported once.
    assert!(root.run_frame().is_ok());
}

fn fails_on_click(_: &()) -> RenderResult {
    let (fail, set_fail) = use_state(|| false);
    if fail {
        return Err(anyhow::anyhow!("clicked into failure"));
    }
    Ok(h("button").attr("id", "fail").on("click", move || set_fail.set(true)).child("ok").into())
}

#[test]
fn late_failures_clear_the_mount() {
    let (doc, root) = mount();
    root.render(component(fails_on_click, ())).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<button id="fail">ok</button>"#);

    click(&doc, "fail");
    let error = root.run_until_idle().unwrap_err();
    assert!(error.to_string().contains("clicked into failure"));
    assert_eq!(body_html(&doc), "");
}

fn recovers_itself(_: &()) -> RenderResult {
    let (fail, set_fail) = use_state(|| false);
    use_error_handler(|_: &Boom| {});
    if fail {
        return Err(Boom.into());
    }
    Ok(h("button").attr("id", "fail").on("click", move || set_fail.set(true)).child("still here").into())
}

#[test]
fn a_handler_on_the_failing_instance_keeps_its_output() {
    let (doc, root) = mount();
    root.render(component(recovers_itself, ())).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "fail");
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<button id="fail">still here</button>"#);
}

#[test]
fn mount_preconditions_are_checked() {
    let document = Rc::new(RefCell::new(Document::new()));
    let host: Rc<RefCell<dyn Host>> = document.clone();
    let missing = NodeHandle::from_raw(404);
    assert!(matches!(
        Root::create(host.clone(), missing, RootOptions::default()),
        Err(RootError::MissingMount(node)) if node == missing
    ));

    let body = document.borrow().body();
    {
        let mut doc = document.borrow_mut();
        let stray = doc.create_text("stray");
        doc.append_child(body, stray).unwrap();
    }
    assert!(matches!(
        Root::create(host, body, RootOptions::default()),
        Err(RootError::MountNotEmpty { children: 1 })
    ));
}

fn parent_of_two(_: &()) -> RenderResult {
    let (count, _) = use_state(|| 7);
    let _ = use_memo(|| count * 2, count);
    Ok(h("div")
        .child(component(label_child, "left".to_string()).key("l"))
        .child(component(label_child, "right".to_string()).key("r"))
        .into())
}

fn label_child(value: &String) -> RenderResult {
    Ok(text(value).into())
}

#[test]
fn snapshots_describe_the_instance_tree() {
    let (_doc, root) = mount();
    root.render(component(parent_of_two, ())).unwrap();
    root.run_until_idle().unwrap();

    let snapshot = root.snapshot().expect("tree is live");
    assert_eq!(snapshot.name, "Root");
    assert_eq!(snapshot.count(), 4);
    let parent = snapshot.find("parent_of_two").expect("parent instance");
    let hooks: Vec<_> = parent.hooks.iter().map(|hook| hook.hook_type).collect();
    assert_eq!(hooks, vec!["use_state", "use_memo"]);
    assert_eq!(parent.children.len(), 2);
    assert!(parent.children.iter().all(|child| child.visible));

    let dump = arbor::render_tree(&snapshot);
    assert!(dump.starts_with("Root [root]"));
    assert!(dump.contains("label_child [inherit]"));
}

fn self_boundary(_: &()) -> RenderResult {
    let (failed, set_failed) = use_state(|| false);
    use_error_handler(move |_: &Boom| set_failed.set(true));
    if !failed {
        return Err(Boom.into());
    }
    Ok(h("p").child("fallback").into())
}

#[test]
fn an_instance_that_recovers_on_mount_shows_its_fallback() {
    let (doc, root) = mount();
    root.render(h("main").child(component(self_boundary, ()))).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), "<main><p>fallback</p></main>");
    assert!(!root.is_torn_down());
}

fn swapped_in(_: &Rc<Counts>) -> RenderResult {
    let _ = use_ref(|| 0u8);
    Ok(h("b").child("b").into())
}

fn chooser(props: &(bool, Rc<Counts>)) -> RenderResult {
    let (swap, counts) = props.clone();
    let render: fn(&Rc<Counts>) -> RenderResult = if swap { swapped_in } else { tracked };
    Ok(h("div").child(component(render, counts)).into())
}

fn view_chooser(swap: bool, counts: &Rc<Counts>) -> Element {
    component(chooser, (swap, counts.clone())).into()
}

#[test]
fn a_different_component_at_the_same_position_replaces_the_instance() {
    let (doc, root) = mount();
    let counts = Rc::new(Counts::default());
    root.render(view_chooser(false, &counts)).unwrap();
    root.run_until_idle().unwrap();
    click(&doc, "bump");
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), r#"<div><button id="bump">1</button></div>"#);

    root.render(view_chooser(true, &counts)).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(body_html(&doc), "<div><b>b</b></div>");
    assert_eq!(counts.unmounted.get(), 1);
    assert_eq!(counts.destroyed.get(), 1);

    let snapshot = root.snapshot().expect("tree is live");
    let chooser = snapshot.find("chooser").expect("chooser instance");
    assert_eq!(chooser.children.len(), 1);
    let hooks: Vec<_> = chooser.children[0].hooks.iter().map(|hook| hook.hook_type).collect();
    assert_eq!(hooks, vec!["use_ref"]);
}

#[derive(Clone)]
struct NotedProps {
    id: u32,
    note: &'static str,
    seen: Rc<RefCell<Vec<&'static str>>>,
}

fn noted(props: &NotedProps) -> RenderResult {
    use_props_comparer(|a: &NotedProps, b: &NotedProps| a.id == b.id);
    let (note, seen) = (props.note, props.seen.clone());
    use_effect(move || seen.borrow_mut().push(note), note);
    Ok(h("span").child(props.id).into())
}

#[test]
fn skipped_renders_do_not_consume_effect_deps() {
    let (_doc, root) = mount();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let view = |id: u32, note: &'static str| {
        component(
            noted,
            NotedProps {
                id,
                note,
                seen: seen.clone(),
            },
        )
    };
    root.render(view(1, "a")).unwrap();
    root.run_until_idle().unwrap();
    root.render(view(1, "b")).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(*seen.borrow(), vec!["a"]);

    root.render(view(2, "b")).unwrap();
    root.run_until_idle().unwrap();
    assert_eq!(*seen.borrow(), vec!["a", "b"]);
}
