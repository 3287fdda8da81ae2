#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = trafficgen::fuzzing::parse_jobs_json_input(data) {
        for (index, job) in file.jobs.iter().enumerate() {
            debug_assert!(!job.display_name(index).is_empty());
            let decoded = trafficgen::config::ClientConfig::decode(&job.args.client);
            if job.args.client.is_null() {
                debug_assert!(decoded.errors.is_empty());
            }
        }
    }
    if let Ok(decoded) = trafficgen::fuzzing::decode_client_config_input(data) {
        let settings = trafficgen::http::ClientSettings::from_config(decoded.config);
        debug_assert!(!settings.timeout.is_zero());
    }
});
