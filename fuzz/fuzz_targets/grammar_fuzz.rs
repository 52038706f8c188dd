#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // malformed grammars must be rejected with an error, never a panic
    let Ok(model) = sprig::load(source) else {
        return;
    };
    let Ok(tables) = sprig::compile(&model) else {
        return;
    };

    let bytes = tables.to_bytes();
    let loaded = sprig::ParserTables::from_bytes(&bytes).expect("artifact loads");
    assert_eq!(loaded, tables);
});
