mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor::core::{FrameDriver, FrameReport};
use arbor::prelude::*;
use pretty_assertions::assert_eq;

use common::{body_html, click, mount, mount_with};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logged(props: &(&'static str, Log)) -> RenderResult {
    let (name, log) = props.clone();
    let (count, set_count) = use_state(|| 0);
    log.borrow_mut().push(name);
    Ok(h("button")
        .attr("id", name)
        .on("click", move || set_count.update(|n| *n += 1))
        .child(count)
        .into())
}

fn pair(log: &Log) -> RenderResult {
    Ok(h("div")
        .child(component(logged, ("a", log.clone())).key("a"))
        .child(component(logged, ("b", log.clone())).key("b"))
        .into())
}

#[test]
fn updates_run_in_request_order() {
    let (doc, root) = mount();
    let log: Log = Rc::default();
    root.render(component(pair, log.clone())).unwrap();
    root.run_until_idle().unwrap();
    log.borrow_mut().clear();

    click(&doc, "b");
    click(&doc, "a");
    click(&doc, "b");
    root.run_until_idle().unwrap();

    assert_eq!(*log.borrow(), vec!["b", "a", "b"]);
    assert_eq!(
        body_html(&doc),
        r#"<div><button id="a">1</button><button id="b">2</button></div>"#
    );
}

#[test]
fn nothing_runs_before_a_frame() {
    let (doc, root) = mount();
    root.render("pending").unwrap();
    assert!(root.needs_frame());
    assert_eq!(body_html(&doc), "");

    let report = root.run_frame().unwrap();
    assert_eq!(report.tasks_run, 1);
    assert_eq!(body_html(&doc), "pending");
    assert!(!root.needs_frame());
}

#[test]
fn floods_are_spread_over_frames() {
    let (doc, root) = mount();
    for n in 0..100 {
        root.render(n).unwrap();
    }

    let first = root.run_frame().unwrap();
    assert_eq!(
        first,
        FrameReport {
            tasks_run: 64,
            tasks_remaining: 36,
            futures_completed: 0,
        }
    );
    assert_eq!(body_html(&doc), "63");
    assert!(root.needs_frame());

    let second = root.run_frame().unwrap();
    assert_eq!(second.tasks_run, 36);
    assert_eq!(second.tasks_remaining, 0);
    assert_eq!(body_html(&doc), "99");
    assert!(!root.needs_frame());
}

#[test]
fn batch_size_is_configurable() {
    let (doc, root) = mount_with(RootOptions::default().with_max_updates_per_frame(10));
    for n in 0..25 {
        root.render(n).unwrap();
    }
    let batches: Vec<usize> = std::iter::from_fn(|| {
        let report = root.run_frame().unwrap();
        (report.tasks_run > 0).then_some(report.tasks_run)
    })
    .collect();
    assert_eq!(batches, vec![10, 10, 5]);
    assert_eq!(body_html(&doc), "24");
}

#[derive(Default)]
struct CountingDriver {
    requests: Cell<usize>,
}

impl FrameDriver for CountingDriver {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

#[test]
fn one_frame_request_per_batch() {
    let (_doc, root) = mount();
    let driver = Rc::new(CountingDriver::default());
    root.set_frame_driver(driver.clone());

    for n in 0..100 {
        root.render(n).unwrap();
    }
    assert_eq!(driver.requests.get(), 1);

    root.run_frame().unwrap();
    assert_eq!(driver.requests.get(), 2);
    root.run_frame().unwrap();
    assert_eq!(driver.requests.get(), 2);

    root.render("again").unwrap();
    assert_eq!(driver.requests.get(), 3);
}

fn effect_chain(log: &Log) -> RenderResult {
    let (step, set_step) = use_state(|| 0);
    let effect_log = log.clone();
    use_effect(
        move || {
            effect_log.borrow_mut().push("effect");
            if step < 2 {
                set_step.set(step + 1);
            }
        },
        step,
    );
    log.borrow_mut().push("render");
    Ok(text(step).into())
}

#[test]
fn effects_run_after_the_render_that_queued_them() {
    let (doc, root) = mount();
    let log: Log = Rc::default();
    root.render(component(effect_chain, log.clone())).unwrap();
    root.run_until_idle().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["render", "effect", "render", "effect", "render", "effect"]
    );
    assert_eq!(body_html(&doc), "2");
}
