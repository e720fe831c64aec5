#![no_main]

use libfuzzer_sys::fuzz_target;
use shiguredo_multipart::HeaderParameters;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for header in ["Content-Type", "Accept", "Transfer-Encoding", "Content-Disposition"] {
            let params = HeaderParameters::parse(header, s);

            // パニックしなければ OK
            let _ = params.value();
            let _ = params.media_type();
            let _ = params.subtype();
            let _ = params.boundary();
            let _ = params.name();
            let _ = params.filename();
            let _ = params.is_media_type("multipart", "form-data");
            assert_eq!(params.raw(), s);
        }
    }
});
