use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use fleetsim_core::AgentId;
use fleetsim_index::{AcquisitionFunction, CellId, SeaGrid};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Duration;

fn bench_acquisition(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquisition_pick");
    group.measurement_time(Duration::from_secs(5));

    let sides: Vec<usize> = std::env::var("FLEETSIM_BENCH_SIDES")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![50_usize, 200]);

    for side in sides {
        let grid = SeaGrid::new(side, side).expect("grid");
        let peak = CellId::new(side * 2 / 3, side / 4);
        let surface = move |cell: CellId, _time: f64, _agent: AgentId| {
            let dx = cell.x as f64 - peak.x as f64;
            let dy = cell.y as f64 - peak.y as f64;
            -(dx * dx + dy * dy).sqrt()
        };
        let functions = [
            (
                "exhaustive",
                AcquisitionFunction::Exhaustive {
                    proportion_searched: 0.2,
                    ignore_wastelands: true,
                    ignore_protected_areas: true,
                },
            ),
            ("hill_climbing", AcquisitionFunction::HillClimbing { step_size: 1 }),
        ];
        for (name, function) in functions {
            group.bench_function(format!("{name}_{side}x{side}"), |b| {
                b.iter_batched(
                    || SmallRng::seed_from_u64(0xACE),
                    |mut rng| {
                        function.pick(
                            &grid,
                            &surface,
                            0.0,
                            AgentId::default(),
                            Some(CellId::new(0, side - 1)),
                            &mut rng,
                        )
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_acquisition);
criterion_main!(benches);
