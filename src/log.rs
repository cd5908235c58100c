use std::io::Write;

use env_logger::Builder;

/// Initialize structured logging from `RUST_LOG`, for development and
/// test visibility only — nothing in the core depends on logging
/// having been called.
pub fn init_log() {
    let mut builder = Builder::from_default_env();
    builder
        .format_timestamp_secs()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(cfg!(test))
        .try_init()
        .ok();
}
