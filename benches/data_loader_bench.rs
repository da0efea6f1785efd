use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batch_loader::{BatchFn, DataLoader};
use criterion::Criterion;
use futures_util::future::join_all;

#[derive(Clone, Default)]
struct Squares {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl BatchFn<u64> for Squares {
    type Value = u64;
    type Error = String;

    async fn load(&self, keys: &[u64]) -> Result<Vec<Result<u64, String>>, String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(keys.iter().map(|key| Ok(key * key)).collect())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

pub fn benchmark_data_loader(c: &mut Criterion) {
    let runtime = runtime();

    c.bench_function("data loader coalesce 1000 loads", |b| {
        b.to_async(&runtime).iter(|| async {
            let squares = Squares::default();
            let loader = DataLoader::new(squares.clone()).max_batch_size(100);

            // Every key is requested twice.
            let loads: Vec<_> = (0..1000u64).map(|key| loader.load(key % 500)).collect();
            let values = join_all(loads).await;

            assert_eq!(values.len(), 1000);
            assert_eq!(squares.calls.load(Ordering::Relaxed), 5);
        });
    });
}

pub fn benchmark_cache_hits(c: &mut Criterion) {
    let runtime = runtime();
    let loader = DataLoader::new(Squares::default());
    runtime.block_on(async {
        loader.load_many(0..1000u64).await.unwrap();
    });

    let loader = &loader;
    c.bench_function("data loader cache hits", |b| {
        b.to_async(&runtime).iter(|| async move {
            let values = loader.load_many(0..1000u64).await.unwrap();
            assert_eq!(values.len(), 1000);
        });
    });
}
