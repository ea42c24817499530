use arbor_core::{Component, MutableCell, Reconciler, RenderScope, StateSetter, View, ViewTag};
use arbor_testing::{hstack, text, vstack, TargetId, TestRenderer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const SECTION_COUNT: usize = 4;
const ROWS_PER_SECTION_SAMPLES: &[usize] = &[16, 64];

struct Section {
    index: usize,
    rows: usize,
}

impl Component for Section {
    const TAG: ViewTag = ViewTag::new("Section");

    fn render(&self, _scope: &mut RenderScope<'_>) -> View {
        let index = self.index;
        let heading = text(format!("Section {index}"));
        let rows = (0..self.rows).map(|row| {
            hstack([
                text(format!("Item {index}-{row} title")),
                text(format!("Detail {index}-{row}")),
            ])
        });
        vstack(std::iter::once(heading).chain(rows))
    }

    fn props_eq(&self, previous: &Self) -> bool {
        self.index == previous.index && self.rows == previous.rows
    }
}

fn pipeline_content(sections: usize, rows_per_section: usize) -> View {
    vstack((0..sections).map(|index| {
        View::composite(Section {
            index,
            rows: rows_per_section,
        })
    }))
}

type TickSlot = MutableCell<Option<StateSetter<u64>>>;

struct Ticker {
    slot: TickSlot,
    sections: usize,
    rows_per_section: usize,
}

impl Component for Ticker {
    const TAG: ViewTag = ViewTag::new("Ticker");

    fn render(&self, scope: &mut RenderScope<'_>) -> View {
        let (tick, set) = scope.state(0_u64);
        self.slot.replace(Some(set));
        vstack([
            text(format!("tick {tick}")),
            pipeline_content(self.sections, self.rows_per_section),
        ])
    }
}

fn ui_object_count(sections: usize, rows_per_section: usize) -> usize {
    1 + sections * (2 + rows_per_section * 3)
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_mount");
    for &rows_per_section in ROWS_PER_SECTION_SAMPLES {
        let total_ui_objects = ui_object_count(SECTION_COUNT, rows_per_section);
        group.bench_with_input(
            BenchmarkId::new("ui_objects", total_ui_objects),
            &(SECTION_COUNT, rows_per_section),
            |b, &(sections, rows_per_section)| {
                b.iter(|| {
                    let reconciler = Reconciler::new(
                        TestRenderer::new(),
                        TargetId::ROOT,
                        pipeline_content(sections, rows_per_section),
                    );
                    black_box(reconciler.node_count());
                });
            },
        );
    }
    group.finish();
}

fn bench_rediff(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_rediff");
    for &rows_per_section in ROWS_PER_SECTION_SAMPLES {
        let total_ui_objects = ui_object_count(SECTION_COUNT, rows_per_section);
        group.bench_with_input(
            BenchmarkId::new("ui_objects", total_ui_objects),
            &(SECTION_COUNT, rows_per_section),
            |b, &(sections, rows_per_section)| {
                let mut reconciler = Reconciler::new(
                    TestRenderer::new(),
                    TargetId::ROOT,
                    pipeline_content(sections, rows_per_section),
                );

                b.iter(|| {
                    reconciler
                        .set_root(pipeline_content(sections, rows_per_section))
                        .expect("rediff");
                    black_box(reconciler.renderer_mut().take_ops());
                });
            },
        );
    }
    group.finish();
}

fn bench_state_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_state_update");
    for &rows_per_section in ROWS_PER_SECTION_SAMPLES {
        let total_ui_objects = ui_object_count(SECTION_COUNT, rows_per_section) + 2;
        group.bench_with_input(
            BenchmarkId::new("ui_objects", total_ui_objects),
            &(SECTION_COUNT, rows_per_section),
            |b, &(sections, rows_per_section)| {
                let slot = TickSlot::new(None);
                let mut reconciler = Reconciler::new(
                    TestRenderer::new(),
                    TargetId::ROOT,
                    View::composite(Ticker {
                        slot: slot.clone(),
                        sections,
                        rows_per_section,
                    }),
                );
                let mut tick = 0;

                b.iter(|| {
                    tick += 1;
                    slot.with(|setter| {
                        setter.as_ref().expect("ticker rendered").set(tick);
                    });
                    reconciler.process_pending_updates().expect("update pass");
                    black_box(reconciler.renderer_mut().take_ops());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_mount, bench_rediff, bench_state_update);
criterion_main!(benches);
