use std::process::Stdio;
use tokio::process::{Child, Command};

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert command is empty")]
    NoCommand,

    #[error("failed to start alert {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Audible (or haptic) cue played when the wake lock is lost.
pub trait AlertCue: Send {
    /// Return to the beginning of the cue, stopping any playback in progress.
    fn rewind(&mut self);
    fn play(&mut self) -> Result<(), AlertError>;
}

#[derive(Debug, Default)]
pub struct SilentCue;

impl AlertCue for SilentCue {
    fn rewind(&mut self) {}

    fn play(&mut self) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Plays the cue by running an external command, e.g.
/// `["/system/bin/cmd", "vibrator", "vibrate", "600"]`.
#[derive(Debug)]
pub struct CommandCue {
    argv: Vec<String>,
    playing: Option<Child>,
}

impl CommandCue {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            playing: None,
        }
    }
}

impl AlertCue for CommandCue {
    fn rewind(&mut self) {
        if let Some(mut child) = self.playing.take()
            && let Ok(None) = child.try_wait()
        {
            let _ = child.start_kill();
        }
    }

    fn play(&mut self) -> Result<(), AlertError> {
        let (program, args) = self.argv.split_first().ok_or(AlertError::NoCommand)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AlertError::Spawn {
                program: program.clone(),
                source,
            })?;
        self.playing = Some(child);
        Ok(())
    }
}

/// Build the cue described by `alert.command`.
pub fn from_command(argv: &[String]) -> Box<dyn AlertCue> {
    if argv.is_empty() {
        Box::new(SilentCue)
    } else {
        Box::new(CommandCue::new(argv.to_vec()))
    }
}
