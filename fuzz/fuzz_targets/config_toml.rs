#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(file) = trafficgen::fuzzing::parse_jobs_toml_input(input) {
            for job in &file.jobs {
                if let Ok(request) = trafficgen::fuzzing::render_request_input(
                    &job.args.method,
                    &job.args.path,
                    &job.args.body,
                    &job.args.headers,
                ) {
                    let _ = request.to_wire_bytes();
                }
            }
        }
    }
});
