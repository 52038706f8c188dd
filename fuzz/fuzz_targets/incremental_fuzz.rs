#![no_main]
use libfuzzer_sys::fuzz_target;
use sprig::{Edit, ParserTables};
use std::sync::{Arc, OnceLock};

fn tables() -> &'static Arc<ParserTables> {
    static TABLES: OnceLock<Arc<ParserTables>> = OnceLock::new();
    TABLES.get_or_init(|| {
        let model = sprig::load(include_str!("../../crates/sprig/grammars/arithmetic.json"))
            .expect("bundled grammar loads");
        Arc::new(sprig::compile(&model).expect("bundled grammar compiles"))
    })
}

fuzz_target!(|data: &[u8]| {
    // two position bytes, then the old text and the replacement split at 0xFF
    let [a, b, rest @ ..] = data else {
        return;
    };
    let (old_text, replacement) = match rest.iter().position(|byte| *byte == 0xFF) {
        Some(split) => (&rest[..split], &rest[split + 1..]),
        None => (rest, &[][..]),
    };

    let a = usize::from(*a).min(old_text.len());
    let b = usize::from(*b).min(old_text.len());
    let edit = Edit::replace(a.min(b)..a.max(b), replacement.len());

    let mut new_text = old_text[..edit.start_byte].to_vec();
    new_text.extend_from_slice(replacement);
    new_text.extend_from_slice(&old_text[edit.old_end_byte..]);

    let old = sprig::parse(tables(), old_text);
    let new = sprig::reparse(tables(), &old, &edit, &new_text).expect("edit is consistent");
    let fresh = sprig::parse(tables(), &new_text);

    // incremental and full parse should produce identical trees
    assert!(
        new.structurally_eq(&fresh),
        "{} != {}",
        new.to_sexp(),
        fresh.to_sexp()
    );
});
