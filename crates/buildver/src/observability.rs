//! Structured logging.
//!
//! Log records are written as JSON lines to a file resolved from
//! `BUILDVER_LOG_PATH`, `BUILDVER_LOG_DIR`, the config's `log_dir` or the
//! platform data directory. stdout carries the version output that build
//! scripts capture, so nothing here writes to it; when no file is writable the
//! records go to stderr.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "BUILDVER_LOG_PATH";
const ENV_LOG_DIR: &str = "BUILDVER_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and as whom to log.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name; also the log file stem.
    pub service: String,
    /// Directory from the loaded config, if set.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Config for this binary with the config file's `log_dir`.
    pub fn new(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

/// Holds the background writer; logs are flushed when dropped.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Never fails today; an unwritable log location falls back to stderr.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match LogTarget::resolve(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLines::new(writer))
        .init();

    tracing::debug!(service = %cfg.service, "logging initialized");

    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` from CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > config level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// ============================================================================
// JSON lines layer
// ============================================================================

struct JsonLines<W> {
    writer: W,
}

impl<W> JsonLines<W> {
    const fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLines<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFields(fields.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = FieldMap::default();
        values.record(&mut fields);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(existing) => existing.0.extend(fields.0),
            None => extensions.insert(SpanFields(fields.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert("timestamp".into(), Value::String(timestamp_now()));
        record.insert(
            "level".into(),
            Value::String(meta.level().as_str().to_lowercase()),
        );
        record.insert("target".into(), Value::String(meta.target().to_string()));

        // Outer spans first so the event's own fields win on collision
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record.extend(fields.0.clone());
                }
            }
        }

        let mut fields = FieldMap::default();
        event.record(&mut fields);
        record.extend(fields.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(record)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct FieldMap(Map<String, Value>);

impl FieldMap {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldMap {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// UTC timestamp, RFC 3339 with milliseconds.
fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let of_day = secs % 86_400;

    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60,
        now.subsec_millis()
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (Hinnant's algorithm).
const fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

// ============================================================================
// Log file resolution
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

impl LogTarget {
    fn resolve(service: &str, config_dir: Option<&Utf8Path>) -> Result<Self> {
        let from_env = |name: &str| {
            std::env::var_os(name)
                .and_then(|value| Utf8PathBuf::from_path_buf(value.into()).ok())
        };
        Self::resolve_with(
            service,
            from_env(ENV_LOG_PATH),
            from_env(ENV_LOG_DIR),
            config_dir.map(Utf8Path::to_path_buf),
        )
    }

    /// First of: explicit file, env dir, config dir, then the first writable
    /// default location.
    fn resolve_with(
        service: &str,
        path: Option<Utf8PathBuf>,
        env_dir: Option<Utf8PathBuf>,
        config_dir: Option<Utf8PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_path(&path);
        }
        if let Some(dir) = env_dir.or(config_dir) {
            return Self::in_dir(dir, service);
        }

        let defaults = buildver_core::config::user_data_local_dir()
            .map(|dir| dir.join("logs"))
            .into_iter()
            .chain(
                std::env::current_dir()
                    .ok()
                    .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok()),
            );
        for dir in defaults {
            if let Ok(target) = Self::in_dir(dir, service) {
                return Ok(target);
            }
        }
        Err(anyhow!("no writable log directory found"))
    }

    fn in_dir(dir: Utf8PathBuf, service: &str) -> Result<Self> {
        let target = Self {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn from_path(path: &Utf8Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must include a file name"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."))
            .to_path_buf();
        let target = Self { dir, file_name };
        target.ensure_writable()?;
        Ok(target)
    }

    fn path(&self) -> Utf8PathBuf {
        self.dir.join(&self.file_name)
    }

    fn ensure_writable(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow!("failed to create log directory {}: {e}", self.dir))?;
        let path = self.path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow!("failed to open log file {path}: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, dir)
    }

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(env_filter(true, 2, "info").to_string(), "error");
    }

    #[test]
    fn verbose_maps_to_debug_and_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 3, "info").to_string(), "trace");
    }

    #[test]
    fn explicit_path_wins() {
        let (_tmp, dir) = temp_dir();
        let file = dir.join("nested").join("custom.jsonl");
        let target =
            LogTarget::resolve_with("buildver", Some(file.clone()), Some(dir.clone()), None)
                .unwrap();
        assert_eq!(target.path(), file);
        assert!(file.exists());
    }

    #[test]
    fn env_dir_beats_config_dir() {
        let (_tmp, dir) = temp_dir();
        let env_dir = dir.join("env");
        let config_dir = dir.join("config");
        let target =
            LogTarget::resolve_with("buildver", None, Some(env_dir.clone()), Some(config_dir))
                .unwrap();
        assert_eq!(target.dir, env_dir);
        assert_eq!(target.file_name, "buildver.jsonl");
    }

    #[test]
    fn config_dir_used_without_env() {
        let (_tmp, dir) = temp_dir();
        let target = LogTarget::resolve_with("demo", None, None, Some(dir.clone())).unwrap();
        assert_eq!(target.path(), dir.join("demo.jsonl"));
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 24, "{ts}");
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }
}
