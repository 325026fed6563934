use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use hopscotch_image::hash::jenkins_one_at_a_time;
use hopscotch_image::{Config, Error, HopscotchTable, Image};
use rand::{Rng, SeedableRng};

const KEY_LENGTH: u32 = 24;

fn random_keys(count: usize) -> Vec<[u8; 24]> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    (0..count).map(|_| rng.random()).collect()
}

fn filled_table(exponent: u8, neighborhood: u8, load: f64) -> (HopscotchTable, Vec<[u8; 24]>) {
    let mut table = Config::new(KEY_LENGTH, KEY_LENGTH)
        .exponent(exponent)
        .neighborhood(neighborhood)
        .build()
        .unwrap();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let target = (table.capacity() as f64 * load) as usize;

    let mut inserted = Vec::with_capacity(target);

    for key in random_keys(target * 2) {
        if inserted.len() == target {
            break;
        }
        match table.insert(key, key) {
            Ok(()) => inserted.push(key),
            Err(Error::DuplicateKey | Error::CapacityExhausted) => {}
            Err(e) => panic!("{e:?}"),
        }
    }

    (table, inserted)
}

fn hash(c: &mut Criterion) {
    let key = [7u8; 24];

    c.bench_function("jenkins one-at-a-time (24 bytes)", |b| {
        b.iter(|| jenkins_one_at_a_time(&key));
    });
}

fn insert(c: &mut Criterion) {
    let keys = random_keys(50_000);

    for neighborhood in [8, 32] {
        c.bench_function(&format!("insert 50K keys into 2^17 buckets, H={neighborhood}"), |b| {
            b.iter_batched(
                || {
                    Config::new(KEY_LENGTH, KEY_LENGTH)
                        .exponent(17)
                        .neighborhood(neighborhood)
                        .build()
                        .unwrap()
                },
                |mut table| {
                    for key in &keys {
                        let _ = table.insert(*key, *key);
                    }
                    table
                },
                BatchSize::LargeInput,
            );
        });
    }
}

fn lookup(c: &mut Criterion) {
    for load in [0.5, 0.9] {
        let (table, keys) = filled_table(16, 32, load);
        let mut rng = rand::rng();

        c.bench_function(&format!("lookup, hit (load {load})"), |b| {
            b.iter(|| {
                let key = keys[rng.random_range(0..keys.len())];
                assert!(table.lookup(&key).unwrap().is_some());
            });
        });

        c.bench_function(&format!("lookup, miss (load {load})"), |b| {
            b.iter(|| {
                let key: [u8; 24] = rng.random();
                table.lookup(&key).unwrap()
            });
        });
    }
}

fn serialize(c: &mut Criterion) {
    let (table, _) = filled_table(16, 32, 0.8);

    c.bench_function("serialize 2^16 buckets", |b| {
        b.iter(|| Image::from_table(&table).unwrap());
    });
}

criterion_group!(benches, hash, insert, lookup, serialize);
criterion_main!(benches);
