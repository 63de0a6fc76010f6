//! Counter and todo list demo.
//!
//! Renders into an in-memory document, simulates a few clicks and prints
//! the resulting markup and instance tree.
//!
//! Run with: cargo run -p counter
//! Set RUST_LOG=arbor_core=debug to watch instances being created and hidden.

use std::time::Duration;

use arbor::prelude::*;

#[derive(Clone, PartialEq)]
struct Todo {
    id: u32,
    title: String,
    done: bool,
}

fn counter(_: &()) -> RenderResult {
    let (count, set_count) = use_state(|| 0);
    use_effect(move || tracing::info!(count, "counter changed"), count);
    Ok(h("div")
        .attr("class", "counter")
        .child(h("span").child(format!("Clicked {count} times")))
        .child(
            h("button")
                .attr("id", "increment")
                .on("click", move || set_count.update(|n| *n += 1))
                .child("+1"),
        )
        .into())
}

struct TodoItemProps {
    todo: Todo,
    on_toggle: EventHandler,
}

fn todo_item(props: &TodoItemProps) -> RenderResult {
    let on_toggle = props.on_toggle.clone();
    let mut item = h("li")
        .attr("id", format!("todo-{}", props.todo.id))
        .on("click", move || on_toggle.invoke())
        .child(props.todo.title.clone());
    if props.todo.done {
        item = item.attr("class", "done").style("color", "gray");
    }
    Ok(item.into())
}

fn todo_list(_: &()) -> RenderResult {
    let (todos, set_todos) = use_state(|| {
        vec![
            Todo {
                id: 1,
                title: "Write the reconciler".into(),
                done: false,
            },
            Todo {
                id: 2,
                title: "Write the scheduler".into(),
                done: false,
            },
            Todo {
                id: 3,
                title: "Ship it".into(),
                done: false,
            },
        ]
    });
    let remaining = use_memo(
        {
            let todos = todos.clone();
            move || todos.iter().filter(|todo| !todo.done).count()
        },
        todos.clone(),
    );

    // Finished items sink to the bottom; keys keep their instances.
    let mut ordered = todos.clone();
    ordered.sort_by_key(|todo| todo.done);

    Ok(h("section")
        .child(h("h2").child(format!("{remaining} left")))
        .child(h("ul").children(ordered.into_iter().map(|todo| {
            let id = todo.id;
            let set_todos = set_todos.clone();
            let on_toggle = EventHandler::new(move || {
                set_todos.update(|todos| {
                    if let Some(todo) = todos.iter_mut().find(|todo| todo.id == id) {
                        todo.done = !todo.done;
                    }
                })
            });
            component(todo_item, TodoItemProps { todo, on_toggle }).key(id)
        })))
        .into())
}

fn slow_greeting(_: &()) -> RenderResult {
    let greeting = use_memo(
        || {
            Deferred::new(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<Element, anyhow::Error>(h("p").child("Loaded after a short wait").into())
            })
        },
        (),
    );
    Ok(suspense(SuspenseProps::new(h("p").child("Loading..."), greeting)).into())
}

fn demo(_: &()) -> RenderResult {
    Ok(fragment()
        .child(h("h1").child("arbor demo"))
        .child(component(counter, ()))
        .child(component(todo_list, ()))
        .child(component(slow_greeting, ()))
        .into())
}

fn click(app: &App, id: &str) {
    let node = app.document().borrow().find_by_attr("id", id);
    match node {
        Some(node) => {
            app.dispatch(node, "click");
        }
        None => tracing::warn!(id, "nothing to click"),
    }
}

fn main() -> anyhow::Result<()> {
    let config = RuntimeConfig::default();
    block_on(&config, async {
        let app = App::new(config.clone())?;
        app.render(component(demo, ()))?;
        app.run_until_idle().await?;
        println!("initial:\n{}\n", app.html());

        click(&app, "increment");
        click(&app, "increment");
        click(&app, "todo-1");
        app.run_until_idle().await?;
        println!("after clicks:\n{}\n", app.html());

        if let Some(snapshot) = app.root().snapshot() {
            println!("{}", arbor::render_tree(&snapshot));
        }
        Ok::<_, ShellError>(())
    })??;
    Ok(())
}
