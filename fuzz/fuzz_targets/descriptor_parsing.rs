#![no_main]
use dashboard_registry::plugin::{Descriptor, DescriptorFile};
use dashboard_registry::{index_only, DescriptorLoader, PanelFactories, RegistryError, Site};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Descriptors come from third-party plugins: parsing must never panic
    let Some(file) = DescriptorFile::from_path("_1000_fuzz.toml") else {
        return;
    };

    match Descriptor::from_bytes(file, data) {
        Ok(descriptor) => {
            // Applying a lone descriptor either registers a dashboard or
            // leaves a dangling/invalid reference; it never panics
            let site = Site::new();
            let factories = PanelFactories::new().with_fallback(index_only());
            let _ = DescriptorLoader::new(&site, &factories).apply(vec![descriptor]);
            let _ = site.route_table();
        }
        Err(RegistryError::DescriptorInvalid { file, .. }) => {
            assert!(file.ends_with("_1000_fuzz.toml"));
        }
        Err(other) => panic!("unexpected error kind: {:?}", other),
    }
    let _ = Descriptor::declares_optional(&String::from_utf8_lossy(data));
});
