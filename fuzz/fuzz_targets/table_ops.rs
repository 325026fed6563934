#![no_main]
use hopscotch_image::remote::{MemoryTransport, RemoteTable};
use hopscotch_image::{Config, Error, Image};
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};
use std::collections::HashMap;

#[derive(Arbitrary, Debug)]
enum Op {
    Insert(u16, u8),
    Remove(u16),
    Resize(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    exponent: u8,
    neighborhood: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let exponent = 1 + input.exponent % 8;
    let neighborhood = 1 + input.neighborhood % 32;

    let mut table = Config::new(2, 1)
        .exponent(exponent)
        .neighborhood(neighborhood)
        .max_exponent(12)
        .build()
        .unwrap();

    let mut model = HashMap::new();

    for op in input.ops {
        match op {
            Op::Insert(key, value) => match table.insert(key.to_be_bytes(), [value]) {
                Ok(()) => {
                    assert!(model.insert(key, value).is_none());
                }
                Err(Error::DuplicateKey) => assert!(model.contains_key(&key)),
                Err(Error::CapacityExhausted) => {}
                Err(e) => panic!("{e:?}"),
            },
            Op::Remove(key) => {
                let removed = table.remove(&key.to_be_bytes()).unwrap();
                assert_eq!(model.remove(&key).map(|v| [v].into()), removed);
            }
            Op::Resize(delta) => {
                let _ = table.resize(delta % 3);
            }
        }
    }

    assert_eq!(model.len(), table.len());

    let transport = MemoryTransport::new();
    let handshake = transport.publish(&Image::from_table(&table).unwrap());
    let client = RemoteTable::connect(&transport, &handshake).unwrap();

    for (key, value) in &model {
        let key = key.to_be_bytes();
        assert_eq!(Some([*value].into()), table.lookup(&key).unwrap());
        assert_eq!(Some([*value].into()), client.get(&key).unwrap());
    }
});
