use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use tincan_store::{
    apply_middleware, key, record, Event, EventBus, FnMiddleware, StateStore, Store,
};

record! {
    struct State => StatePatch {
        counter: usize,
        name: String,
    }
}

record! {
    struct Player => PlayerPatch {
        health: u32,
    }
}

record! {
    struct Game => GamePatch {
        player: Player,
        score: usize,
    }
}

struct Tick(usize);

impl Event for Tick {
    const NAME: &'static str = "tick";
}

fn state() -> State {
    State {
        counter: 0,
        name: "test".to_string(),
    }
}

fn store_read_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_read", |b| {
        b.iter(|| {
            black_box(store.get());
        });
    });
}

fn store_update_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_update", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update(|state| {
                state.counter = black_box(i);
            });
            i += 1;
        });
    });
}

fn store_patch_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_patch", |b| {
        let mut i = 0;
        b.iter(|| {
            store.patch(StatePatch {
                counter: Some(black_box(i)),
                ..Default::default()
            });
            i += 1;
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(state());

        for _ in 0..*subscriber_count {
            store.subscribe(|_| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|state| state.counter = black_box(i));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn key_subscribe_benchmark(c: &mut Criterion) {
    let store = Store::new(state());
    for _ in 0..10 {
        store
            .subscribe_to_key(key!(State, name), |_| {})
            .unwrap_or_else(|e| panic!("{e}"));
    }

    // Writes that leave `name` alone skip its key subscribers
    c.bench_function("key_subscribe_unchanged", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update(|state| state.counter = black_box(i));
            i += 1;
        });
    });
}

fn middleware_patch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("middleware_patch");

    for middleware_count in [1, 5, 20].iter() {
        let pipeline = (0..*middleware_count)
            .map(|n| {
                FnMiddleware::<State>::new(format!("m{n}"))
                    .before(|_, patch| Some(patch.clone()))
                    .boxed()
            })
            .collect();
        let store = apply_middleware(Store::new(state()), pipeline)
            .unwrap_or_else(|e| panic!("{e}"));

        group.bench_with_input(
            BenchmarkId::from_parameter(middleware_count),
            middleware_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.patch(StatePatch {
                        counter: Some(black_box(i)),
                        ..Default::default()
                    });
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn scoped_write_benchmark(c: &mut Criterion) {
    let store = Store::new(Game {
        player: Player { health: 100 },
        score: 0,
    });
    let scoped = store.scope(
        |game: &Game| game.player.clone(),
        |mut game: Game, player: Player| {
            game.player = player;
            game
        },
    );
    scoped.subscribe(|_| {});

    c.bench_function("scoped_write", |b| {
        let mut i = 0;
        b.iter(|| {
            scoped.set(Player {
                health: black_box(i),
            });
            i += 1;
        });
    });
}

fn event_emit_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_emit");

    for listener_count in [1, 10, 100].iter() {
        let bus = EventBus::new();
        for _ in 0..*listener_count {
            bus.on(|tick: &Tick| {
                black_box(tick.0);
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(listener_count),
            listener_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    bus.emit(&Tick(black_box(i)));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_read_benchmark,
    store_update_benchmark,
    store_patch_benchmark,
    store_subscribe_benchmark,
    key_subscribe_benchmark,
    middleware_patch_benchmark,
    scoped_write_benchmark,
    event_emit_benchmark,
);
criterion_main!(benches);
