use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use snake_duel::audit::{verify_record, MatchRecord};
use snake_duel::{ContestantId, Direction, Engine, MatchMode, MATCH_DURATION_MS, TICK_INTERVAL_MS};

const T0: u64 = 1_700_000_000_000;
const KEY: &str = "0x1f2e3d4c5b6a79881f2e3d4c5b6a79881f2e3d4c";

/// Full match with a press every few ticks, both contestants circling.
fn play(presses: usize) -> Engine {
    let mut engine = Engine::new(KEY, MatchMode::Duel, T0);
    let one = [Direction::Down, Direction::Left, Direction::Up, Direction::Right];
    let two = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];
    let mut now = T0;
    let mut step = 0;
    while now < T0 + MATCH_DURATION_MS {
        now += TICK_INTERVAL_MS;
        if step < presses && step % 3 == 0 {
            engine.queue_input(ContestantId::One, one[(step / 3) % 4], now);
            engine.queue_input(ContestantId::Two, two[(step / 3) % 4], now);
        }
        step += 1;
        if engine.advance(now).match_ended {
            break;
        }
    }
    engine
}

fn engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    group.bench_function("single_tick", |b| {
        b.iter_batched(
            || Engine::new(KEY, MatchMode::Duel, T0),
            |mut engine| black_box(engine.advance(T0 + TICK_INTERVAL_MS)),
            criterion::BatchSize::SmallInput,
        )
    });

    for presses in [0usize, 30, 300] {
        group.bench_function(BenchmarkId::new("full_match", presses), |b| {
            b.iter(|| black_box(play(presses).outcome_digest()))
        });
    }

    group.finish();
}

fn replay_verify(c: &mut Criterion) {
    let engine = play(300);
    let record = MatchRecord::from_engine(&engine, T0 + MATCH_DURATION_MS);

    c.bench_function("verify_record", |b| {
        b.iter(|| black_box(verify_record(&record).is_ok()))
    });
}

criterion_group!(benches, engine_tick, replay_verify);
criterion_main!(benches);
