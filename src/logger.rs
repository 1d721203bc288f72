use chrono::{DateTime, Utc};
use colored::*;
use log::kv::{self, Key, Source, Value as KvValue, VisitSource};
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

static CONSOLE_LOGGER: Lazy<ConsoleLogger> = Lazy::new(ConsoleLogger::new);

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_log_level_filter();
    CONSOLE_LOGGER.update_config(config);

    log::set_logger(&*CONSOLE_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_log_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_log_level_filter(&self) -> log::LevelFilter {
        self.to_log_level().to_level_filter()
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// Parses `LOG_LEVEL` values such as `debug` or `WARN`.
impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// One structured record, printed as a line or as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            request_id: None,
            task_id: None,
            context: HashMap::new(),
            duration_ms: None,
        }
    }

    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_to_file: false,
            log_file_path: "vidgen.log".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Applies `LOG_LEVEL` when it names a known level, otherwise keeps the current one.
    pub fn with_level_name(self, name: Option<&str>) -> Self {
        match name.map(LogLevel::from_str) {
            Some(Ok(level)) => self.with_level(level),
            _ => self,
        }
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_to_file = true;
        self.log_file_path = path.to_string();
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            log_to_file: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// Builds the logger settings from `LOG_FORMAT`, `LOG_LEVEL` and `LOG_FILE`.
    ///
    /// `LOG_FORMAT` is one of `pretty` (default), `plain`, `json`,
    /// `development` or `production`. `LOG_LEVEL` overrides the preset's level.
    pub fn from_app_config(config: &crate::config::Config) -> Self {
        let format = config
            .log_format
            .as_deref()
            .map(|format| format.trim().to_ascii_lowercase());
        let base = match format.as_deref() {
            Some("json") => Self::new().with_json_output(true),
            Some("plain") => Self::new().with_colors(false),
            Some("dev") | Some("development") => Self::development(),
            Some("prod") | Some("production") => Self::production(),
            _ => Self::new(),
        };
        let base = base.with_level_name(config.log_level.as_deref());
        match config.log_file.as_deref() {
            Some(path) => base.with_file_output(path),
            None => base,
        }
    }
}

/// Writes to stderr so command output on stdout stays machine readable.
pub struct ConsoleLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) {
        if new_config.log_to_file {
            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_config.log_file_path)
            {
                Ok(file) => *relock(&self.log_file) = Some(file),
                Err(e) => eprintln!(
                    "could not open log file {}: {}",
                    new_config.log_file_path, e
                ),
            }
        }
        *relock(&self.config) = new_config;
    }

    fn format_line(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if config.show_colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if config.show_colors {
            output.push_str(&format!("[{}] ", level.color(entry.level.color()).bold()));
        } else {
            output.push_str(&format!("[{}] ", level));
        }

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}::", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}::", entry.module));
            }
        }

        output.push_str(&entry.message);

        if !entry.context.is_empty() {
            let context = serde_json::to_string(&entry.context).unwrap_or_default();
            if config.show_colors {
                output.push_str(&format!(" {}", context.bright_cyan()));
            } else {
                output.push_str(&format!(" {}", context));
            }
        }

        if let Some(task_id) = &entry.task_id {
            output.push_str(&format!(" [task:{}]", task_id));
        }

        if let Some(request_id) = &entry.request_id {
            if config.show_colors {
                output.push_str(&format!(" [req:{}]", request_id.bright_yellow()));
            } else {
                output.push_str(&format!(" [req:{}]", request_id));
            }
        }

        if let Some(duration) = entry.duration_ms {
            output.push_str(&format!(" [{}ms]", duration));
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn render(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        if config.output_json {
            serde_json::to_string(entry).unwrap_or_default()
        } else {
            self.format_line(entry, config)
        }
    }

    fn write_to_file(&self, entry: &LogEntry, config: &LoggerConfig) {
        if let Some(file) = relock(&self.log_file).as_mut() {
            let plain = LoggerConfig {
                show_colors: false,
                ..config.clone()
            };
            let _ = writeln!(file, "{}", self.render(entry, &plain));
        }
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        let mut fields = RecordFields::default();
        let _ = record.key_values().visit(&mut fields);

        let mut entry = LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        );
        if let Some(request_id) = fields.request_id {
            entry = entry.with_request_id(request_id);
        }
        if let Some(task_id) = fields.task_id {
            entry = entry.with_task_id(task_id);
        }
        if let Some(ms) = fields.duration_ms {
            entry = entry.with_duration(Duration::from_millis(ms));
        }
        for (key, value) in fields.context {
            entry = entry.with_context(&key, value);
        }
        entry
    }
}

/// Key-values attached at the call site, e.g.
/// `log::info!(task_id = id.as_str(); "Task created")`.
#[derive(Default)]
struct RecordFields {
    request_id: Option<String>,
    task_id: Option<String>,
    duration_ms: Option<u64>,
    context: Vec<(String, serde_json::Value)>,
}

impl<'kvs> VisitSource<'kvs> for RecordFields {
    fn visit_pair(&mut self, key: Key<'kvs>, value: KvValue<'kvs>) -> Result<(), kv::Error> {
        match key.as_str() {
            "request_id" => self.request_id = Some(value.to_string()),
            "task_id" => self.task_id = Some(value.to_string()),
            "duration_ms" => {
                self.duration_ms = value.to_u64().or_else(|| value.to_string().parse().ok())
            }
            other => self
                .context
                .push((other.to_string(), serde_json::Value::String(value.to_string()))),
        }
        Ok(())
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= relock(&self.config).min_level.to_log_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);
        let config = relock(&self.config).clone();

        eprintln!("{}", self.render(&entry, &config));
        if config.log_to_file {
            self.write_to_file(&entry, &config);
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = relock(&self.log_file).as_mut() {
            let _ = file.flush();
        }
    }
}

/// Logs how long a named operation took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!(
            "⏱️  {} completed in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str, host: &str, port: u16) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("🌐 Server will run on http://{}:{}", host, port);
}

/// Prints the loaded configuration. Secrets are reported as set or unset only.
pub fn log_config_info(config: &crate::config::Config) {
    let flag = |set: bool| if set { "✅" } else { "❌" };
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Port: {}", config.port_or_default());
    log::info!("   Kie.ai base URL: {}", config.kie.base_url);
    log::info!("   KIE_API_KEY: {}", flag(config.kie.api_key.is_some()));
    log::info!(
        "   Callback URL: {}",
        config.kie.callback_url.as_deref().unwrap_or("none")
    );
    log::info!("   Session guard: {}", flag(config.secret_key.is_some()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);

        let config = LoggerConfig::new().with_level_name(Some("trace"));
        assert_eq!(config.min_level, LogLevel::Trace);
        let config = LoggerConfig::new().with_level_name(Some("nonsense"));
        assert_eq!(config.min_level, LogLevel::Info);
    }

    #[test]
    fn test_line_carries_task_and_request_ids() {
        let logger = ConsoleLogger::new();
        let config = LoggerConfig::new().with_colors(false);
        let entry = LogEntry::new(
            LogLevel::Info,
            "Task created".to_string(),
            "vidgen::kie".to_string(),
            "src/kie/task_client.rs".to_string(),
            56,
        )
        .with_task_id("task_abc")
        .with_request_id("req-1")
        .with_duration(Duration::from_millis(12));

        let line = logger.format_line(&entry, &config);
        assert!(line.contains("vidgen::kie::Task created"));
        assert!(line.contains("[task:task_abc]"));
        assert!(line.contains("[req:req-1]"));
        assert!(line.contains("[12ms]"));

        let json = logger.render(&entry, &config.with_json_output(true));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["task_id"], "task_abc");
    }

    #[test]
    fn test_record_key_values_fill_entry() {
        let logger = ConsoleLogger::new();
        let kvs = [
            ("task_id", "task_9"),
            ("request_id", "req-9"),
            ("duration_ms", "15"),
            ("model", "sora-2-pro-text-to-video"),
        ];
        let entry = logger.create_log_entry(
            &Record::builder()
                .args(format_args!("Task created"))
                .level(Level::Info)
                .module_path(Some("vidgen::kie::task_client"))
                .key_values(&kvs)
                .build(),
        );

        assert_eq!(entry.message, "Task created");
        assert_eq!(entry.task_id.as_deref(), Some("task_9"));
        assert_eq!(entry.request_id.as_deref(), Some("req-9"));
        assert_eq!(entry.duration_ms, Some(15));
        assert_eq!(
            entry.context.get("model"),
            Some(&serde_json::json!("sora-2-pro-text-to-video"))
        );
    }

    #[test]
    fn test_config_selects_output() {
        let mut app = crate::config::Config::new();
        app.log_format = Some("JSON".to_string());
        app.log_level = Some("warn".to_string());
        let config = LoggerConfig::from_app_config(&app);
        assert!(config.output_json);
        assert_eq!(config.min_level, LogLevel::Warn);
        assert!(!config.log_to_file);

        app.log_format = Some("development".to_string());
        app.log_level = None;
        app.log_file = Some("/tmp/vidgen-test.log".to_string());
        let config = LoggerConfig::from_app_config(&app);
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.log_to_file);
        assert_eq!(config.log_file_path, "/tmp/vidgen-test.log");

        app.log_format = Some("plain".to_string());
        assert!(!LoggerConfig::from_app_config(&app).show_colors);

        app.log_format = Some("production".to_string());
        assert!(LoggerConfig::from_app_config(&app).output_json);
    }

    #[test]
    fn test_logger_initialization() {
        let config = LoggerConfig::development();
        assert!(init_with_config(config).is_ok());
    }
}
