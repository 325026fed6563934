#![no_main]
use hopscotch_image::image::RecordLayout;
use hopscotch_image::remote::lookup_in_window;
use hopscotch_image::Slice;
use libfuzzer_sys::{
    arbitrary::{Arbitrary, Unstructured},
    fuzz_target,
};

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);

    let Ok(key_length) = <u8 as Arbitrary>::arbitrary(&mut unstructured) else {
        return;
    };
    let Ok(value_length) = <u8 as Arbitrary>::arbitrary(&mut unstructured) else {
        return;
    };
    let Ok(alignment_shift) = <u8 as Arbitrary>::arbitrary(&mut unstructured) else {
        return;
    };

    let key_length = u32::from(key_length.max(1));
    let layout = RecordLayout::new(
        key_length,
        u32::from(value_length),
        1 << (alignment_shift % 7),
    );

    let key = vec![0xAB; key_length as usize];
    let window = Slice::from(unstructured.take_rest());

    // Arbitrary bytes may fail to decode, but must never panic, and a
    // returned value always fits into the value field
    if let Ok(Some(value)) = lookup_in_window(&layout, &window, &key) {
        assert!(value.len() <= layout.value_length());
    }
});
