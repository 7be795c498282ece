#![no_main]

use cilshred::{shredder::walk_module, CilLoader, CilWriter, ShredOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut assembly) = CilLoader::new().load_bytes(data.to_vec()) else {
        return;
    };

    for module in assembly.modules.iter_mut().flatten() {
        if walk_module(module, &ShredOptions::default()).is_ok() {
            let _ = CilWriter::new().render(module);
        }
    }
});
