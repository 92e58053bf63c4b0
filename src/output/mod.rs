// ABOUTME: Output module routing emitted lines to their destinations
// ABOUTME: Builds a channel router from a script's output configuration

pub mod config;
pub mod error;
pub mod writer;

use std::collections::HashMap;
use tracing::debug;

pub use self::config::{Destination, OutputConfig};
pub use self::error::{OutputError, Result};
pub use self::writer::{Emitter, FileEmitter, MemoryEmitter, NullEmitter, StdoutEmitter};

/// Routes each line to the emitter configured for its channel
pub struct ChannelRouter {
    sinks: Vec<Box<dyn Emitter>>,
    default_sink: usize,
    routes: HashMap<String, usize>,
    emitted: usize,
}

impl ChannelRouter {
    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        let mut sinks: Vec<Box<dyn Emitter>> = Vec::new();
        let mut opened: HashMap<Destination, usize> = HashMap::new();

        let mut open = |destination: &str| -> Result<usize> {
            let destination = Destination::parse(destination)?;
            if let Some(index) = opened.get(&destination) {
                return Ok(*index);
            }
            let sink: Box<dyn Emitter> = match &destination {
                Destination::Stdout => Box::new(StdoutEmitter::new()),
                Destination::Discard => Box::new(NullEmitter),
                Destination::File(path) => {
                    Box::new(FileEmitter::create(path, config.append, config.create_dirs)?)
                }
            };
            sinks.push(sink);
            opened.insert(destination, sinks.len() - 1);
            Ok(sinks.len() - 1)
        };

        let default_sink = open(&config.default)?;
        let mut routes = HashMap::new();
        for (channel, destination) in &config.channels {
            let index = open(destination)?;
            debug!("Routing channel '{}' to {}", channel, destination);
            routes.insert(channel.clone(), index);
        }

        Ok(Self {
            sinks,
            default_sink,
            routes,
            emitted: 0,
        })
    }

    /// Route everything to one emitter
    pub fn single(emitter: Box<dyn Emitter>) -> Self {
        Self {
            sinks: vec![emitter],
            default_sink: 0,
            routes: HashMap::new(),
            emitted: 0,
        }
    }

    pub fn lines_emitted(&self) -> usize {
        self.emitted
    }
}

impl Emitter for ChannelRouter {
    fn emit(&mut self, line: &str, channel: Option<&str>) -> Result<()> {
        let index = channel
            .and_then(|c| self.routes.get(c))
            .copied()
            .unwrap_or(self.default_sink);
        self.sinks[index].emit(line, channel)?;
        self.emitted += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
