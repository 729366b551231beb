// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::str::FromStr;

use log;
use log::{LogLevel, LogMetadata, LogRecord};

/// Console logger with an overall level and optional per-target overrides
/// given as `target=level` pairs (e.g. `cpu::ins=trace`).
pub struct Logger {
    level: LogLevel,
    targets: HashMap<String, LogLevel>,
}

impl Logger {
    pub fn build(level: &str, target_levels: &[String]) -> Result<Logger, String> {
        let level =
            LogLevel::from_str(level).map_err(|_| format!("invalid log level {}", level))?;
        let mut logger = Logger {
            level,
            targets: HashMap::new(),
        };
        for mapping in target_levels {
            match mapping.find('=') {
                Some(split) => {
                    let (target, level) = mapping.split_at(split);
                    logger.add_target(target.to_string(), level[1..].to_string())?;
                }
                None => return Err(format!("invalid log mapping {}", mapping)),
            }
        }
        Ok(logger)
    }

    pub fn enable(logger: Logger) -> Result<(), String> {
        log::set_logger(|max_log_level| {
            max_log_level.set(logger.get_level().to_log_level_filter());
            Box::new(logger)
        })
        .map_err(|_| "cannot initialize logging".to_string())
    }

    pub fn add_target(&mut self, target: String, level: String) -> Result<(), String> {
        let level = LogLevel::from_str(&level)
            .map_err(|_| format!("invalid log level {} for target {}", level, &target))?;
        self.targets.insert(target, level);
        Ok(())
    }

    pub fn get_level(&self) -> LogLevel {
        self.level
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &LogMetadata) -> bool {
        if let Some(target_level) = self.targets.get(metadata.target()) {
            metadata.level() <= *target_level
        } else {
            metadata.level() <= self.level
        }
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            println!(
                "{} [{}] - {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }
}
