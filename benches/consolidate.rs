//! Consolidation benchmarks: per-account and MASTER views over synthetic books.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use opsdesk::{
    AccountId, CalculatedPosition, ManualAdjustment, Ticker, consolidate_by_account,
    consolidate_master,
};

/// Generate a synthetic book: `n_accounts` accounts, `n_tickers` tickers,
/// `rows_per_group` backend rows per (account, ticker).
///
/// Prices and quantities drift using a simple deterministic RNG.
fn generate_book(
    n_accounts: u64,
    n_tickers: usize,
    rows_per_group: usize,
) -> Vec<CalculatedPosition> {
    let tickers: Vec<Ticker> = (0..n_tickers)
        .map(|i| Ticker::new(&format!("S{i:03}")))
        .collect();

    // Simple deterministic PRNG (xorshift32)
    let mut rng_state: u32 = 42;
    let mut rows = Vec::with_capacity(n_accounts as usize * n_tickers * rows_per_group);

    for account in 1..=n_accounts {
        for &ticker in &tickers {
            for _ in 0..rows_per_group {
                rng_state ^= rng_state << 13;
                rng_state ^= rng_state >> 17;
                rng_state ^= rng_state << 5;

                let qty = (rng_state % 1_000) as i64 + 1;
                let price = 10.0 + (rng_state % 9_000) as f64 / 100.0;
                rows.push(CalculatedPosition::new(AccountId(account), ticker, qty, price));
            }
        }
    }
    rows
}

/// One open adjustment per account on a rotating ticker.
fn generate_adjustments(n_accounts: u64, n_tickers: usize) -> Vec<ManualAdjustment> {
    (1..=n_accounts)
        .map(|account| {
            let ticker = Ticker::new(&format!("S{:03}", account as usize % n_tickers));
            let delta = if account % 2 == 0 { 50 } else { -50 };
            ManualAdjustment::new("bench", AccountId(account), ticker, delta, Some(25.0), "bench")
        })
        .collect()
}

/// Benchmark: per-account consolidation at desk-realistic sizes
fn bench_by_account(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidate/by_account");

    for (n_accounts, n_tickers) in [(10u64, 20usize), (50, 30), (200, 50)] {
        let rows = generate_book(n_accounts, n_tickers, 3);
        let adjs = generate_adjustments(n_accounts, n_tickers);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_accounts}acct_{n_tickers}tick")),
            &(rows, adjs),
            |b, (rows, adjs)| {
                b.iter(|| black_box(consolidate_by_account(rows, adjs)));
            },
        );
    }

    group.finish();
}

/// Benchmark: MASTER projection over the same inputs
fn bench_master(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidate/master");

    for (n_accounts, n_tickers) in [(10u64, 20usize), (200, 50)] {
        let rows = generate_book(n_accounts, n_tickers, 3);
        let adjs = generate_adjustments(n_accounts, n_tickers);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_accounts}acct_{n_tickers}tick")),
            &(rows, adjs),
            |b, (rows, adjs)| {
                b.iter(|| black_box(consolidate_master(rows, adjs)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_by_account, bench_master);
criterion_main!(benches);
