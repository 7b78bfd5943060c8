mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{App, Captured, captured, take};
use flact::prelude::*;

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

fn any_dirty(app: &App) -> bool {
    app.runtime
        .with_tree(|tree| tree.iter().any(|(_, node)| node.is_dirty()))
}

#[test]
fn test_effect_runs_on_dependency_change_only() {
    let app = App::new();
    let events = log();
    let setters: Captured<(SetState<i32>, SetState<i32>)> = captured();

    let sink = Rc::clone(&events);
    let slot = setters.clone();
    let view = Component::new("Watcher", move |hooks, _| {
        let (x, set_x) = hooks.use_state(|| 1);
        let (y, set_y) = hooks.use_state(|| 0);
        *slot.borrow_mut() = Some((set_x, set_y));

        let sink = Rc::clone(&sink);
        hooks.use_effect(deps![x], move || {
            sink.borrow_mut().push(format!("run {x}"));
            move || sink.borrow_mut().push(format!("cleanup {x}"))
        });
        h("p", Props::new(), format!("{x}/{y}"))
    });

    app.mount(h(view, Props::new(), ()));
    assert_eq!(drain(&events), ["run 1"]);

    let (set_x, set_y) = take(&setters);
    set_y.set(5);
    app.settle();
    assert_eq!(app.text(), "1/5");
    assert!(drain(&events).is_empty());

    set_x.set(2);
    app.settle();
    assert_eq!(drain(&events), ["cleanup 1", "run 2"]);
}

#[test]
fn test_equal_dispatch_is_ignored() {
    let app = App::new();
    let setter: Captured<SetState<&'static str>> = captured();
    let renders = Rc::new(Cell::new(0));

    let slot = setter.clone();
    let count = Rc::clone(&renders);
    let view = Component::new("Same", move |hooks, _| {
        count.set(count.get() + 1);
        let (value, set_value) = hooks.use_state(|| "a");
        *slot.borrow_mut() = Some(set_value);
        value
    });
    app.mount(h(view, Props::new(), ()));
    assert_eq!(renders.get(), 1);

    take(&setter).set("a");
    assert_eq!(app.runtime.pending_tasks(), 0);
    assert!(!any_dirty(&app));

    take(&setter).set("b");
    take(&setter).set("c");
    assert_eq!(app.runtime.pending_tasks(), 1, "one re-render while dirty");
    app.settle();
    assert_eq!(renders.get(), 2);
    assert_eq!(app.text(), "c");
}

#[test]
fn test_layout_effects_run_before_passive_effects() {
    let app = App::new();
    let events = log();

    let sink = Rc::clone(&events);
    let child = Component::new("Child", move |hooks, _| {
        let layout = Rc::clone(&sink);
        hooks.use_layout_effect(deps![], move || layout.borrow_mut().push("child layout".into()));
        let passive = Rc::clone(&sink);
        hooks.use_effect(deps![], move || passive.borrow_mut().push("child passive".into()));
        h("i", Props::new(), ())
    });
    let sink = Rc::clone(&events);
    let parent = Component::new("Parent", move |hooks, _| {
        let layout = Rc::clone(&sink);
        hooks.use_layout_effect(deps![], move || layout.borrow_mut().push("parent layout".into()));
        let passive = Rc::clone(&sink);
        hooks.use_effect(deps![], move || passive.borrow_mut().push("parent passive".into()));
        h("div", Props::new(), h(child.clone(), Props::new(), ()))
    });

    app.runtime
        .render(h(parent, Props::new(), ()), Some(app.container))
        .unwrap();
    let report = app.runtime.flush();
    assert_eq!(report.ran, 3, "reconcile plus one effect task per component");
    assert_eq!(
        drain(&events),
        ["child layout", "parent layout", "child passive", "parent passive"]
    );
}

#[test]
fn test_teardown_runs_each_cleanup_once_in_order() {
    let app = App::new();
    let events = log();
    let shown: Captured<SetState<bool>> = captured();

    let sink = Rc::clone(&events);
    let widget = Component::new("Widget", move |hooks, _| {
        for (name, layout) in [("first", false), ("second", true), ("third", false)] {
            let sink = Rc::clone(&sink);
            let body = move || move || sink.borrow_mut().push(name.to_string());
            if layout {
                hooks.use_layout_effect(deps![], body);
            } else {
                hooks.use_effect(deps![], body);
            }
        }
        h("span", Props::new(), "w")
    });
    let slot = shown.clone();
    let view = Component::new("Toggle", move |hooks, _| {
        let (visible, set_visible) = hooks.use_state(|| true);
        *slot.borrow_mut() = Some(set_visible);
        h("div", Props::new(), visible.then(|| h(widget.clone(), Props::new(), ())))
    });

    app.mount(h(view, Props::new(), ()));
    assert!(drain(&events).is_empty());

    take(&shown).set(false);
    app.settle();
    assert_eq!(drain(&events), ["first", "second", "third"]);
    assert_eq!(app.html(), "<div></div>");

    app.settle();
    assert!(drain(&events).is_empty());
}

#[test]
fn test_listener_removed_on_teardown() {
    let app = App::new();
    let shown: Captured<SetState<bool>> = captured();
    let clicks = Rc::new(Cell::new(0));

    let slot = shown.clone();
    let counter = Rc::clone(&clicks);
    let view = Component::new("Button", move |hooks, _| {
        let (visible, set_visible) = hooks.use_state(|| true);
        *slot.borrow_mut() = Some(set_visible);
        let counter = Rc::clone(&counter);
        visible.then(|| {
            h(
                "button",
                Props::new().on("click", move |_| counter.set(counter.get() + 1)),
                "go",
            )
        })
    });
    app.mount(h(view, Props::new(), ()));
    let button = app.find("button");
    assert!(app.click(button));

    take(&shown).set(false);
    app.settle();
    assert!(!app.click(button));
    assert_eq!(clicks.get(), 1);
}

#[test]
fn test_memo_and_callback_identity() {
    let app = App::new();
    let computed = Rc::new(Cell::new(0));
    let setters: Captured<(SetState<i32>, SetState<i32>)> = captured();
    let callbacks: Rc<RefCell<Vec<Rc<dyn Fn() -> i32>>>> = Rc::new(RefCell::new(Vec::new()));
    let once = Rc::new(Cell::new(0));

    let count = Rc::clone(&computed);
    let once_count = Rc::clone(&once);
    let seen = Rc::clone(&callbacks);
    let slot = setters.clone();
    let view = Component::new("Memo", move |hooks, _| {
        let (a, set_a) = hooks.use_state(|| 1);
        let (b, set_b) = hooks.use_state(|| 1);
        *slot.borrow_mut() = Some((set_a, set_b));

        let doubled = hooks.use_memo(deps![a], || {
            count.set(count.get() + 1);
            a * 2
        });
        hooks.use_memo(deps![], || once_count.set(once_count.get() + 1));
        let callback = hooks.use_callback(deps![a], move || a + 1);
        seen.borrow_mut().push(callback);
        format!("{doubled}:{b}")
    });

    app.mount(h(view, Props::new(), ()));
    let (set_a, set_b) = take(&setters);
    set_b.set(2);
    app.settle();
    assert_eq!(app.text(), "2:2");
    assert_eq!(computed.get(), 1);

    set_a.set(3);
    app.settle();
    assert_eq!(app.text(), "6:2");
    assert_eq!(computed.get(), 2);
    assert_eq!(once.get(), 1);

    let callbacks = callbacks.borrow();
    assert_eq!(callbacks.len(), 3);
    assert!(Rc::ptr_eq(&callbacks[0], &callbacks[1]));
    assert!(!Rc::ptr_eq(&callbacks[1], &callbacks[2]));
    assert_eq!(callbacks[2](), 4);
}

#[test]
fn test_ref_hook_persists_without_rerender() {
    let app = App::new();
    let refs: Captured<RefObject<u32>> = captured();
    let renders = Rc::new(Cell::new(0));

    let slot = refs.clone();
    let count = Rc::clone(&renders);
    let view = Component::new("Ref", move |hooks, _| {
        count.set(count.get() + 1);
        let cell = hooks.use_ref(|| 0_u32);
        *slot.borrow_mut() = Some(cell);
        ()
    });
    app.mount(h(view, Props::new(), ()));

    let cell = take(&refs);
    cell.set_current(7);
    assert_eq!(app.runtime.pending_tasks(), 0);
    assert_eq!(cell.current(), 7);
    assert!(cell.assign("current", 8).is_ok());
    assert_eq!(cell.current(), 8);

    let err = cell.assign("value", 9).unwrap_err();
    assert!(matches!(err, FlactError::RefAssignment { ref field } if field == "value"));
    assert_eq!(renders.get(), 1);
}

#[derive(Debug, Clone, PartialEq)]
struct Todos {
    items: Vec<String>,
    filter: bool,
}

enum TodoAction {
    Add(&'static str),
    Toggle,
}

#[test]
fn test_reducer_hook() {
    let app = App::new();
    let dispatch: Captured<Dispatch<TodoAction>> = captured();

    let slot = dispatch.clone();
    let view = Component::new("Todos", move |hooks, _| {
        let (state, send) = hooks.use_reducer(
            |state: &Todos, action: TodoAction| {
                let mut next = state.clone();
                match action {
                    TodoAction::Add(item) => next.items.push(item.to_string()),
                    TodoAction::Toggle => next.filter = !next.filter,
                }
                next
            },
            || Todos {
                items: Vec::new(),
                filter: false,
            },
        );
        *slot.borrow_mut() = Some(send);
        format!("{}:{}", state.items.join(","), state.filter)
    });
    app.mount(h(view, Props::new(), ()));
    assert_eq!(app.text(), ":false");

    let send = take(&dispatch);
    send.dispatch(TodoAction::Add("milk"));
    send.dispatch(TodoAction::Add("eggs"));
    send.dispatch(TodoAction::Toggle);
    app.settle();
    assert_eq!(app.text(), "milk,eggs:true");
    assert!(take(&dispatch) == send, "dispatch handle is stable");
}

#[test]
fn test_mutable_state_tracks_deep_writes() {
    let app = App::new();
    let state: Captured<MutableState> = captured();
    let renders = Rc::new(Cell::new(0));

    let slot = state.clone();
    let count = Rc::clone(&renders);
    let view = Component::new("Profile", move |hooks, _| -> FlactResult<Child> {
        count.set(count.get() + 1);
        let profile = hooks.use_mutable_state(|| {
            Value::record([
                ("name", Value::from("ada")),
                ("tags", Value::from(vec![Value::from("x")])),
            ])
        })?;
        *slot.borrow_mut() = Some(profile.clone());
        let name = profile.field("name").get().unwrap_or_default();
        let tags = profile
            .field("tags")
            .with(|v| v.and_then(Value::as_list).map_or(0, Vec::len));
        Ok(format!("{}#{tags}", name.as_text().map_or("", |s| s.as_str())).into())
    });
    app.mount(h(view, Props::new(), ()));
    assert_eq!(app.text(), "ada#1");

    let profile = take(&state);
    profile.field("name").set("ada").unwrap();
    assert_eq!(app.runtime.pending_tasks(), 0);

    profile.field("name").set("grace").unwrap();
    profile.field("tags").push("y").unwrap();
    app.settle();
    assert_eq!(app.text(), "grace#2");
    assert_eq!(renders.get(), 2);

    assert!(matches!(
        profile.field("missing").field("deep").set(1),
        Err(FlactError::MutablePath { .. })
    ));
}

#[test]
fn test_mutable_state_rejects_non_record() {
    let app = App::new();
    let attempts = Rc::new(Cell::new(0));
    let count = Rc::clone(&attempts);
    let view = Component::new("Broken", move |hooks, _| -> FlactResult<Child> {
        count.set(count.get() + 1);
        hooks.use_mutable_state(|| Value::from(3))?;
        Ok(Child::Empty)
    });
    app.runtime
        .render(h(view, Props::new(), ()), Some(app.container))
        .unwrap();

    let report = app.runtime.flush();
    assert_eq!(report.failed, 4);
    assert_eq!(report.dropped, 1);
    assert_eq!(attempts.get(), 4);
    assert_eq!(app.html(), "");
}
