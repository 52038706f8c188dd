#![no_main]
use libfuzzer_sys::fuzz_target;
use sprig::ParserTables;
use std::sync::{Arc, OnceLock};

fn tables() -> &'static Arc<ParserTables> {
    static TABLES: OnceLock<Arc<ParserTables>> = OnceLock::new();
    TABLES.get_or_init(|| {
        let model = sprig::load(include_str!("../../crates/sprig/grammars/rescomp.json"))
            .expect("bundled grammar loads");
        Arc::new(sprig::compile(&model).expect("bundled grammar compiles"))
    })
}

fuzz_target!(|data: &[u8]| {
    let tree = sprig::parse(tables(), data);

    // every byte belongs to exactly one leaf
    let mut position = 0;
    for leaf in tree.leaves() {
        assert_eq!(leaf.start_byte(), position);
        position = leaf.end_byte();
    }
    assert_eq!(position, data.len());
    assert_eq!(tree.len(), data.len());
});
