use acs_core::{
    apply_alp, AcsConfig, AcsContext, Action, Classifier, Condition, Effect, Perception, Population,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const LEN: usize = 16;

fn symbol(i: usize) -> char {
    char::from(b'0' + (i % 3) as u8)
}

fn seeded_population(ctx: &AcsContext, size: usize) -> Population {
    let mut pop = Population::with_general_classifiers(ctx);
    for i in 0..size {
        let condition: String = (0..LEN)
            .map(|j| if (i + j) % 4 == 0 { symbol(i + j) } else { '#' })
            .collect();
        let effect: String = (0..LEN)
            .map(|j| if (i * 7 + j) % 11 == 0 { symbol(j + 1) } else { '#' })
            .collect();
        pop.insert(Classifier::new(
            Condition::from(condition.as_str()),
            Action(i % ctx.action_count),
            Effect::fixed(&effect),
            &ctx.config,
            0,
        ));
    }
    pop
}

fn bench_match_set(c: &mut Criterion) {
    let mut ctx = AcsContext::new(AcsConfig::default(), LEN, 8, 1).expect("valid config");
    let mut pop = seeded_population(&ctx, 2_000);
    let perception = Perception::new((0..LEN).map(symbol).collect());
    let next = Perception::new((0..LEN).map(|i| symbol(i + (i % 5 == 0) as usize)).collect());

    let mut group = c.benchmark_group("acs-core/population");

    group.bench_function("match_set_2000", |b| {
        b.iter(|| {
            let ms = pop.match_set(&mut ctx, &perception);
            black_box(ms.len());
        })
    });

    group.bench_function("best_qr_action_2000", |b| {
        let ms = pop.match_set(&mut ctx, &perception);
        b.iter(|| black_box(ms.best_qr_action(&pop)))
    });

    group.bench_function("alp_step", |b| {
        b.iter_batched(
            || (ctx.clone(), pop.clone()),
            |(mut ctx, mut pop)| {
                let ms = pop.match_set(&mut ctx, &perception);
                let mut aset = ms.action_set(&pop, Action(0));
                apply_alp(&mut ctx, &mut pop, &mut aset, None, &perception, &next);
                black_box(pop.len());
            },
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_match_set);
criterion_main!(benches);
