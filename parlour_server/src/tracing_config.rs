use crate::config::*;
use tracing_subscriber::{
    prelude::*,
    filter::filter_fn,
    Layer,
    registry::LookupSpan,
};
use tracing_core::LevelFilter;
use tracing::Subscriber;

use std::path::Path;

fn format_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where S: Subscriber + Send + Sync,
          for<'span> S: LookupSpan<'span>,
          W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi);
    match format
    {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

fn build_target<S>(conf: LogEntry, dir: &Path) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where S: Subscriber + Send + Sync,
          for<'span> S: LookupSpan<'span>,
{
    let layer = match &conf.target
    {
        LogTarget::File { filename } =>
        {
            format_layer(conf.format, tracing_appender::rolling::daily(dir, filename), false)
        }
        LogTarget::Builtin(BuiltinLogTarget::Stdout) =>
        {
            format_layer(conf.format, std::io::stdout, true)
        }
        LogTarget::Builtin(BuiltinLogTarget::Stderr) =>
        {
            format_layer(conf.format, std::io::stderr, true)
        }
    };

    let level: LevelFilter = conf.level.map(Into::into).unwrap_or(LevelFilter::TRACE);
    let modules = conf.modules;

    let filter = filter_fn(move |metadata| {
        metadata.level() <= &level &&
            (
                modules.is_empty() ||
                    if let Some(module) = metadata.module_path() {
                        modules.iter().any(|m| module.starts_with(m))
                    } else {
                        true
                    }
            )
    });

    layer.with_filter(filter).boxed()
}

/// Assemble the subscriber described by the `log` section of the config.
///
/// File targets are written under `conf.dir`, which must already exist.
pub fn build_subscriber(conf: LoggingConfig) -> impl Subscriber + Send + Sync
{
    let mut layers = Vec::new();

    for target in conf.targets
    {
        layers.push(build_target(target, &conf.dir));
    }

    // The global filter only trims noisy modules; per-target filters do the rest
    let filter = tracing_subscriber::filter::Targets::new()
                    .with_default(conf.default_level.unwrap_or(LogLevel::Trace))
                    .with_targets(conf.module_levels);

    tracing_subscriber::registry()
            .with(filter)
            .with(layers)
}
