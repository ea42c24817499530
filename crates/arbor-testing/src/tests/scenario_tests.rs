use super::*;
use crate::primitives::{button, text, vstack, Text};
use arbor_core::{
    view_tag, Component, EffectResult, MutableCell, Primitive, RenderScope, StateSetter, ViewTag,
};
use std::cell::RefCell;
use std::fmt::Display;

thread_local! {
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn log(entry: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

type Slot<T> = MutableCell<Option<StateSetter<T>>>;

fn fire<T: 'static>(slot: &Slot<T>, value: T) {
    slot.with(|setter| setter.as_ref().expect("component rendered").set(value));
}

fn child_of(rule: &ReconcilerTestRule, node: NodeId) -> NodeId {
    rule.reconciler()
        .node_info(node)
        .and_then(|info| info.children.first().copied().flatten())
        .expect("node has a mounted child")
}

struct Root {
    counter: Slot<i32>,
}

impl Component for Root {
    const TAG: ViewTag = view_tag!(Root);

    fn render(&self, _scope: &mut RenderScope<'_>) -> View {
        View::composite(Counter {
            setter: self.counter.clone(),
        })
    }
}

struct Counter {
    setter: Slot<i32>,
}

impl Component for Counter {
    const TAG: ViewTag = view_tag!(Counter);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (value, set) = scope.state(0);
        self.setter.replace(Some(set));
        text(format!("value={value}"))
    }
}

#[test]
fn counter_update_reaches_only_counter_and_its_text() {
    run_test_reconciler(|rule| {
        let slot = Slot::new(None);
        rule.set_content(View::composite(Root {
            counter: slot.clone(),
        }))
        .expect("mount");
        let root = rule.root_id().expect("root mounted");
        let counter = child_of(rule, root);
        let text_node = child_of(rule, counter);
        let text_target = rule.take_ops()[0].target();

        fire(&slot, 1);
        assert_eq!(rule.pump_until_idle(), Ok(1));

        assert_eq!(
            rule.take_ops(),
            vec![RenderOp::Update {
                target: text_target,
                tag: Text::TAG,
            }]
        );
        assert_eq!(rule.texts(), vec!["value=1"]);

        let reconciler = rule.reconciler();
        let counter = reconciler.node_info(counter).expect("counter mounted");
        assert_eq!((counter.render_count, counter.update_count), (2, 1));
        let root = reconciler.node_info(root).expect("root mounted");
        assert_eq!((root.render_count, root.update_count), (1, 0));
        let text_node = reconciler.node_info(text_node).expect("text mounted");
        assert_eq!(text_node.update_count, 1);
    });
}

struct Parent;

impl Component for Parent {
    const TAG: ViewTag = view_tag!(Parent);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        scope.effect((), || EffectResult::new(|| log("parent finalizer")));
        vstack([
            View::composite(Child { name: "a" }),
            View::composite(Child { name: "b" }),
        ])
    }
}

struct Child {
    name: &'static str,
}

impl Component for Child {
    const TAG: ViewTag = view_tag!(Child);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let name = self.name;
        scope.effect((), move || {
            EffectResult::new(move || log(format!("child {name} finalizer")))
        });
        text(name)
    }
}

#[test]
fn unmount_runs_child_finalizers_first_and_before_completions_fire() {
    run_test_reconciler(|rule| {
        rule.renderer_before_content().set_defer_completions(true);
        rule.set_content(View::composite(Parent)).expect("mount");
        rule.take_ops();

        rule.unmount();
        assert_eq!(
            take_log(),
            vec!["child a finalizer", "child b finalizer", "parent finalizer"]
        );
        let unmounted: Vec<ViewTag> = rule
            .take_ops()
            .into_iter()
            .map(|op| match op {
                RenderOp::Unmount { tag, .. } => tag,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(unmounted, vec![Text::TAG, Text::TAG, crate::Stack::TAG]);

        assert_eq!(rule.reconciler().outstanding_unmounts(), 3);
        assert_eq!(rule.renderer_mut().complete_deferred(), 3);
        assert_eq!(rule.reconciler().outstanding_unmounts(), 0);
    });
}

struct Watcher {
    topic: &'static str,
}

impl Component for Watcher {
    const TAG: ViewTag = view_tag!(Watcher);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let topic = self.topic;
        scope.effect(topic, move || {
            log(format!("subscribe {topic}"));
            EffectResult::new(move || log(format!("unsubscribe {topic}")))
        });
        text(topic)
    }
}

#[test]
fn effect_reruns_after_its_finalizer_only_when_the_dependency_changes() {
    run_test_reconciler(|rule| {
        rule.set_content(View::composite(Watcher { topic: "news" }))
            .expect("mount");
        assert_eq!(take_log(), vec!["subscribe news"]);

        rule.set_content(View::composite(Watcher { topic: "news" }))
            .expect("same dependency");
        assert!(take_log().is_empty());

        rule.set_content(View::composite(Watcher { topic: "sport" }))
            .expect("new dependency");
        assert_eq!(take_log(), vec!["unsubscribe news", "subscribe sport"]);

        rule.unmount();
        assert_eq!(take_log(), vec!["unsubscribe sport"]);
    });
}

struct TwoCells {
    number: Slot<i32>,
    word: Slot<&'static str>,
}

impl Component for TwoCells {
    const TAG: ViewTag = view_tag!(TwoCells);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (number, set_number) = scope.state(0);
        let (word, set_word) = scope.state("a");
        self.number.replace(Some(set_number));
        self.word.replace(Some(set_word));
        text(format!("{number} {word}"))
    }
}

#[test]
fn state_cells_keep_their_own_type_and_value() {
    run_test_reconciler(|rule| {
        let number = Slot::new(None);
        let word = Slot::new(None);
        rule.set_content(View::composite(TwoCells {
            number: number.clone(),
            word: word.clone(),
        }))
        .expect("mount");

        fire(&number, 5);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["5 a"]);

        fire(&word, "b");
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["5 b"]);
    });
}

fn tracked(scope: &mut RenderScope<'_>, name: &'static str) -> View {
    log(format!("render {name}"));
    scope.effect((), move || EffectResult::new(move || log(format!("cleanup {name}"))));
    text(name)
}

struct Alpha;

impl Component for Alpha {
    const TAG: ViewTag = view_tag!(Alpha);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        tracked(scope, "alpha")
    }
}

struct Beta;

impl Component for Beta {
    const TAG: ViewTag = view_tag!(Beta);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        tracked(scope, "beta")
    }
}

struct Switcher {
    show_beta: Slot<bool>,
}

impl Component for Switcher {
    const TAG: ViewTag = view_tag!(Switcher);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (show_beta, set) = scope.state(false);
        self.show_beta.replace(Some(set));
        if show_beta {
            View::composite(Beta)
        } else {
            View::composite(Alpha)
        }
    }
}

#[test]
fn changed_kind_unmounts_the_old_node_before_mounting_the_new_one() {
    run_test_reconciler(|rule| {
        let show_beta = Slot::new(None);
        rule.set_content(View::composite(Switcher {
            show_beta: show_beta.clone(),
        }))
        .expect("mount");
        let root = rule.root_id().expect("root mounted");
        let alpha = child_of(rule, root);
        let alpha_target = rule.take_ops()[0].target();
        take_log();

        fire(&show_beta, true);
        assert_eq!(rule.pump_until_idle(), Ok(1));

        assert_eq!(take_log(), vec!["cleanup alpha", "render beta"]);
        let ops = rule.take_ops();
        assert_eq!(
            ops[0],
            RenderOp::Unmount {
                target: alpha_target,
                tag: Text::TAG,
            }
        );
        assert!(matches!(ops[1], RenderOp::Mount { tag, .. } if tag == Text::TAG));
        assert_eq!(ops.len(), 2);

        assert!(rule.reconciler().node_info(alpha).is_none());
        let beta = child_of(rule, root);
        assert_eq!(
            rule.reconciler().node_info(beta).map(|info| info.tag),
            Some(Beta::TAG)
        );
        assert_eq!(rule.texts(), vec!["beta"]);
    });
}

struct Headed {
    show_beta: Slot<bool>,
}

impl Component for Headed {
    const TAG: ViewTag = view_tag!(Headed);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (show_beta, set) = scope.state(false);
        self.show_beta.replace(Some(set));
        let first = if show_beta {
            View::composite(Beta)
        } else {
            text("first")
        };
        vstack([first, text("second")])
    }
}

#[test]
fn replaced_child_keeps_its_place_among_siblings() {
    run_test_reconciler(|rule| {
        let show_beta = Slot::new(None);
        rule.set_content(View::composite(Headed {
            show_beta: show_beta.clone(),
        }))
        .expect("mount");
        assert_eq!(rule.texts(), vec!["first", "second"]);

        fire(&show_beta, true);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["beta", "second"]);
    });
}

struct Banner {
    shown: Slot<bool>,
}

impl Component for Banner {
    const TAG: ViewTag = view_tag!(Banner);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (shown, set) = scope.state(false);
        self.shown.replace(Some(set));
        let banner = if shown { text("banner") } else { View::Empty };
        vstack([banner, text("body")])
    }
}

#[test]
fn filled_empty_position_keeps_its_place_among_siblings() {
    run_test_reconciler(|rule| {
        let shown = Slot::new(None);
        rule.set_content(View::composite(Banner {
            shown: shown.clone(),
        }))
        .expect("mount");
        assert_eq!(rule.texts(), vec!["body"]);

        fire(&shown, true);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["banner", "body"]);

        fire(&shown, false);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["body"]);
    });
}

struct Labeled<T> {
    value: T,
    clicks: Slot<u32>,
}

impl<T: Display + 'static> Component for Labeled<T> {
    const TAG: ViewTag = view_tag!(Labeled);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (clicks, set) = scope.state(0_u32);
        self.clicks.replace(Some(set));
        text(format!("{} #{clicks}", self.value))
    }
}

#[test]
fn same_kind_with_new_props_keeps_the_node_and_its_state() {
    run_test_reconciler(|rule| {
        let clicks = Slot::new(None);
        rule.set_content(View::composite(Labeled {
            value: 1,
            clicks: clicks.clone(),
        }))
        .expect("mount");
        let root = rule.root_id().expect("root mounted");

        fire(&clicks, 7);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["1 #7"]);
        rule.take_ops();

        rule.set_content(View::composite(Labeled {
            value: "one",
            clicks: clicks.clone(),
        }))
        .expect("different type parameter, same kind");

        assert_eq!(rule.root_id(), Some(root));
        assert_eq!(rule.texts(), vec!["one #7"]);
        let ops = rule.take_ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], RenderOp::Update { .. }));
    });
}

#[test]
fn setter_calls_coalesce_into_one_render() {
    run_test_reconciler(|rule| {
        let slot = Slot::new(None);
        rule.set_content(View::composite(Counter {
            setter: slot.clone(),
        }))
        .expect("mount");
        let root = rule.root_id().expect("root mounted");

        fire(&slot, 1);
        fire(&slot, 2);
        fire(&slot, 3);
        assert_eq!(rule.scheduled_frames(), 1);
        assert_eq!(rule.texts(), vec!["value=0"], "nothing renders before the pass");

        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["value=3"]);
        assert_eq!(
            rule.reconciler().node_info(root).map(|info| info.render_count),
            Some(2)
        );
    });
}

#[test]
fn setter_of_an_unmounted_node_is_ignored() {
    run_test_reconciler(|rule| {
        let slot = Slot::new(None);
        rule.set_content(View::composite(Counter {
            setter: slot.clone(),
        }))
        .expect("mount");
        rule.set_content(text("gone")).expect("replace");
        rule.take_ops();

        fire(&slot, 9);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert!(rule.take_ops().is_empty());
        assert_eq!(rule.texts(), vec!["gone"]);
    });
}

struct ClickCounter;

impl Component for ClickCounter {
    const TAG: ViewTag = view_tag!(ClickCounter);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (count, set) = scope.state(0);
        vstack([
            text(format!("clicked {count}")),
            button("+", move || set.set(count + 1)),
        ])
    }
}

#[test]
fn button_actions_drive_state_updates() {
    run_test_reconciler(|rule| {
        rule.set_content(View::composite(ClickCounter)).expect("mount");

        assert_eq!(rule.click("+"), Ok(1));
        assert_eq!(rule.texts(), vec!["clicked 1"]);
        assert_eq!(rule.click("+"), Ok(1));
        assert_eq!(rule.texts(), vec!["clicked 2"]);
    });
}

type Jobs = MutableCell<Vec<Box<dyn FnOnce()>>>;

struct Loader {
    jobs: Jobs,
}

impl Component for Loader {
    const TAG: ViewTag = view_tag!(Loader);

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (status, set) = scope.state("loading");
        let jobs = self.jobs.clone();
        scope.effect((), move || {
            let alive = MutableCell::new(true);
            let still_alive = alive.clone();
            jobs.update(|jobs| {
                jobs.push(Box::new(move || {
                    if still_alive.get() {
                        set.set("loaded");
                    }
                }))
            });
            EffectResult::new(move || {
                alive.replace(false);
            })
        });
        text(status)
    }
}

fn run_jobs(jobs: &Jobs) {
    for job in jobs.replace(Vec::new()) {
        job();
    }
}

#[test]
fn background_work_lands_while_mounted() {
    run_test_reconciler(|rule| {
        let jobs = Jobs::new(Vec::new());
        rule.set_content(View::composite(Loader { jobs: jobs.clone() }))
            .expect("mount");

        run_jobs(&jobs);
        assert_eq!(rule.pump_until_idle(), Ok(1));
        assert_eq!(rule.texts(), vec!["loaded"]);
    });
}

#[test]
fn background_work_is_dropped_after_the_finalizer_ran() {
    run_test_reconciler(|rule| {
        let jobs = Jobs::new(Vec::new());
        rule.set_content(View::composite(Loader { jobs: jobs.clone() }))
            .expect("mount");
        rule.set_content(text("elsewhere")).expect("replace");
        rule.take_ops();

        run_jobs(&jobs);
        assert!(!rule.reconciler().has_pending_updates());
        assert_eq!(rule.pump_until_idle(), Ok(0));
        assert!(rule.take_ops().is_empty());
    });
}
