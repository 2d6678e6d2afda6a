use std::io::Write;

use colored::Colorize;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter};

/// Route all diagnostics to stderr; stdout carries only the commit message.
pub fn init_logger(verbosity: u8) {
    let level = level_for(verbosity);

    let mut builder = Builder::new();
    builder.target(Target::Stderr);
    builder.filter_level(level);
    // HTTP internals are only interesting at trace level.
    if level < LevelFilter::Trace {
        builder.filter_module("hyper_util", LevelFilter::Warn);
        builder.filter_module("reqwest", LevelFilter::Warn);
    }

    builder.format(|buf, record| {
        let level_label = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        writeln!(buf, "{} {}", level_label, record.args())
    });

    // A second init (e.g. from tests) is harmless.
    let _ = builder.try_init();
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error, // default: only errors
        1 => LevelFilter::Info,  // -v: info and up
        2 => LevelFilter::Debug, // -vv: debug and up
        _ => LevelFilter::Trace, // -vvv: trace and up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Error);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
