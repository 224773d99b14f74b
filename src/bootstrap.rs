//! Startup registration of the package's publishable files and commands.
//!
//! The embedding binary calls [`boot`] once before dispatching arguments. The
//! [`Registry`] it fills is what `config publish` and `list` read from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BUNDLED_CONFIG, BUNDLED_CONFIG_NAME};

/// Where a published file's contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishSource {
    /// Resource compiled into the binary.
    Bundled {
        name: &'static str,
        contents: &'static str,
    },
    /// File on disk, read at publish time.
    File(PathBuf),
}

impl PublishSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Bundled { name, .. } => format!("bundled:{name}"),
            Self::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPair {
    pub source: PublishSource,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub about: &'static str,
}

pub const CHAT_COMMAND: CommandDescriptor = CommandDescriptor {
    name: "chat",
    about: "Chat with an agent through an OpenAI-compatible API",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to read publish source '{}': {source}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Registration tables filled at startup.
#[derive(Debug, Default)]
pub struct Registry {
    publishes: Vec<PublishPair>,
    commands: Vec<CommandDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records publish pairs and, in console runs, commands.
    ///
    /// Repeated destinations and command names are ignored, so calling this
    /// more than once leaves the tables unchanged.
    pub fn register(
        &mut self,
        publishes: impl IntoIterator<Item = PublishPair>,
        commands: &[CommandDescriptor],
        running_in_console: bool,
    ) {
        for pair in publishes {
            if self
                .publishes
                .iter()
                .any(|known| known.destination == pair.destination)
            {
                debug!(destination = %pair.destination.display(), "publish target already registered");
                continue;
            }
            debug!(
                source = %pair.source.describe(),
                destination = %pair.destination.display(),
                "registered publish target"
            );
            self.publishes.push(pair);
        }

        if !running_in_console {
            return;
        }

        for command in commands {
            if self.has_command(command.name) {
                debug!(command = command.name, "command already registered");
                continue;
            }
            debug!(command = command.name, "registered command");
            self.commands.push(*command);
        }
    }

    pub fn publishes(&self) -> &[PublishPair] {
        &self.publishes
    }

    pub fn commands(&self) -> &[CommandDescriptor] {
        &self.commands
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.iter().any(|command| command.name == name)
    }

    /// Writes every registered publish pair to its destination.
    pub fn publish(&self, force: bool) -> Result<Vec<PublishOutcome>, PublishError> {
        self.publishes
            .iter()
            .map(|pair| publish_one(pair, force))
            .collect()
    }
}

/// Registers this package's config file and console commands.
pub fn boot(registry: &mut Registry, config_destination: PathBuf, running_in_console: bool) {
    registry.register(
        [PublishPair {
            source: PublishSource::Bundled {
                name: BUNDLED_CONFIG_NAME,
                contents: BUNDLED_CONFIG,
            },
            destination: config_destination,
        }],
        &[CHAT_COMMAND],
        running_in_console,
    );
}

fn publish_one(pair: &PublishPair, force: bool) -> Result<PublishOutcome, PublishError> {
    let destination = &pair.destination;
    if destination.exists() && !force {
        info!(destination = %destination.display(), "publish target exists, skipping");
        return Ok(PublishOutcome::Skipped(destination.clone()));
    }

    let contents = match &pair.source {
        PublishSource::Bundled { contents, .. } => contents.as_bytes().to_vec(),
        PublishSource::File(path) => fs::read(path).map_err(|source| PublishError::ReadSource {
            path: path.clone(),
            source,
        })?,
    };

    ensure_parent(destination)?;
    fs::write(destination, contents).map_err(|source| PublishError::Write {
        path: destination.clone(),
        source,
    })?;

    info!(
        source = %pair.source.describe(),
        destination = %destination.display(),
        "published"
    );
    Ok(PublishOutcome::Written(destination.clone()))
}

fn ensure_parent(path: &Path) -> Result<(), PublishError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| PublishError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn boot_twice_registers_once() {
        let mut registry = Registry::new();
        boot(&mut registry, PathBuf::from("/tmp/a/openai.toml"), true);
        boot(&mut registry, PathBuf::from("/tmp/a/openai.toml"), true);

        assert_eq!(registry.commands(), &[CHAT_COMMAND]);
        assert_eq!(registry.publishes().len(), 1);
        assert!(registry.has_command("chat"));
    }

    #[test]
    fn commands_are_skipped_outside_console() {
        let mut registry = Registry::new();
        boot(&mut registry, PathBuf::from("/tmp/b/openai.toml"), false);

        assert!(registry.commands().is_empty());
        assert!(!registry.has_command("chat"));
        assert_eq!(registry.publishes().len(), 1);
    }

    #[test]
    fn publish_creates_parents_and_skips_existing() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("nested").join("config").join("openai.toml");
        let mut registry = Registry::new();
        boot(&mut registry, destination.clone(), true);

        let first = registry.publish(false).unwrap();
        assert_eq!(first, vec![PublishOutcome::Written(destination.clone())]);
        assert_eq!(fs::read_to_string(&destination).unwrap(), BUNDLED_CONFIG);

        fs::write(&destination, "# edited\n").unwrap();
        let second = registry.publish(false).unwrap();
        assert_eq!(second, vec![PublishOutcome::Skipped(destination.clone())]);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "# edited\n");

        let forced = registry.publish(true).unwrap();
        assert_eq!(forced, vec![PublishOutcome::Written(destination.clone())]);
        assert_eq!(fs::read_to_string(&destination).unwrap(), BUNDLED_CONFIG);
    }

    #[test]
    fn file_sources_are_copied() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("custom.toml");
        let destination = dir.path().join("out").join("custom.toml");
        fs::write(&source, "[openai]\nmodel = \"x\"\n").unwrap();

        let mut registry = Registry::new();
        registry.register(
            [PublishPair {
                source: PublishSource::File(source),
                destination: destination.clone(),
            }],
            &[],
            true,
        );

        registry.publish(false).unwrap();
        assert_eq!(
            fs::read_to_string(destination).unwrap(),
            "[openai]\nmodel = \"x\"\n"
        );
    }

    #[test]
    fn missing_file_source_is_reported() {
        let dir = tempdir().unwrap();
        let mut registry = Registry::new();
        registry.register(
            [PublishPair {
                source: PublishSource::File(dir.path().join("absent.toml")),
                destination: dir.path().join("dest.toml"),
            }],
            &[],
            true,
        );

        let err = registry.publish(false).unwrap_err();
        assert!(matches!(err, PublishError::ReadSource { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
