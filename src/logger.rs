//! Logging initialization built on `log4rs`.
//!
//! Compilation itself only emits through the `log` macros; binding those to
//! appenders is the embedding application's choice. These helpers cover the
//! common cases: a `log4rs.yaml` file, or a rolling per-application log
//! directory with a separate audit log for security rejections.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Target used by the security validator for audit-relevant rejections.
pub const AUDIT_TARGET: &str = "docwire::audit";

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const ROLL_KEEP: u32 = 7;

/// Initializes the logging system from `log4rs.yaml` in the working directory.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let _ = log4rs::init_file("log4rs.yaml", log4rs::config::Deserializers::default());
    Ok(())
}

/// Initializes the logging system from a specific config file path.
pub fn init_path(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let _ = log4rs::init_file(path, log4rs::config::Deserializers::default());
    Ok(())
}

/// Initializes rolling file logging under `{base_dir}/{app_name}_logs`.
///
/// Creates the directory if missing. Application messages go to
/// `{app_name}.log`; messages logged with the [`AUDIT_TARGET`] target go to a
/// dedicated `{app_name}_audit.log` so security rejections survive log
/// rotation of the noisier application log. A second call after the global
/// logger is set is a no-op `Ok`.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails
/// to build.
pub fn init_for_app_in(
    base_dir: &std::path::Path,
    app_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = base_dir.join(format!("{app_name}_logs"));
    std::fs::create_dir_all(&dir)?;

    let app_roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{app_name}.{{}}.log")).display()), ROLL_KEEP)?;
    let app_policy =
        CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(app_roller));
    let app_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}")))
        .build(dir.join(format!("{app_name}.log")), Box::new(app_policy))?;

    let audit_roller = FixedWindowRoller::builder().build(
        &format!("{}", dir.join(format!("{app_name}.audit.{{}}.log")).display()),
        ROLL_KEEP,
    )?;
    let audit_policy =
        CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(audit_roller));
    let audit_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {m}{n}")))
        .build(dir.join(format!("{app_name}_audit.log")), Box::new(audit_policy))?;

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app_appender)))
        .appender(Appender::builder().build("audit", Box::new(audit_appender)))
        .logger(
            Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info),
        )
        .build(Root::builder().appender("app").build(LevelFilter::Info))?;
    // init_config errors once a global logger exists; treat that as already-configured.
    let _ = log4rs::init_config(config);
    Ok(())
}
