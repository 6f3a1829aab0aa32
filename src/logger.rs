use chrono::Local;
use env_logger::{Builder, Env};
use log::{Level, Record};
use std::io::{IsTerminal, Write};

/// `RUST_LOG` wins over `default_filter`. Colours only on a terminal.
pub fn init_logger(default_filter: &str) {
    let colored = std::io::stderr().is_terminal();

    let result = Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(move |buf, record| {
            let time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let (color, reset) = if colored {
                (level_color(record.level()), "\x1b[0m")
            } else {
                ("", "")
            };
            writeln!(
                buf,
                "{} {}{:<5}{} [{}] {}",
                time,
                color,
                record.level(),
                reset,
                source_location(record),
                record.args(),
            )
        })
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialised: {}", e);
    }
}

fn source_location(record: &Record) -> String {
    format!(
        "{}:{}",
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0)
    )
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m\x1b[1m", // 红色
        Level::Warn => "\x1b[33m\x1b[1m",  // 黄色
        Level::Info => "\x1b[32m\x1b[1m",  // 绿色
        Level::Debug => "\x1b[36m\x1b[1m", // 青色
        Level::Trace => "\x1b[90m\x1b[1m", // 灰色
    }
}
