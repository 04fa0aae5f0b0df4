//! Moderator commands typed while a discussion runs.

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Plain text is injected into the discussion.
    Say(String),
    Pause(String),
    Resume(String),
    Stop(String),
    Finish(String),
    Restart(String),
    Interrupt,
    Topic(String),
    Rate(f64),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  <text>            speak to the agents as the moderator
  /pause <agent>    skip an agent until resumed
  /resume <agent>   let a paused agent speak again
  /stop <agent>     remove an agent until restarted
  /finish <agent>   mark an agent as done
  /restart <agent>  bring a stopped or finished agent back
  /interrupt        cancel the turn in progress
  /topic <text>     change the discussion topic
  /rate <n>         turns per base delay, e.g. 2.0
  /status           show agent states
  /quit             stop the discussion";

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if matches!(line, "exit" | "quit" | "q") {
            return Ok(Some(Self::Quit));
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.to_string())));
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));

        let needs_arg = |build: fn(String) -> Self| {
            if arg.is_empty() {
                Err(format!("/{name} needs an argument"))
            } else {
                Ok(Some(build(arg.to_string())))
            }
        };

        match name {
            "pause" => needs_arg(Self::Pause),
            "resume" => needs_arg(Self::Resume),
            "stop" => needs_arg(Self::Stop),
            "finish" => needs_arg(Self::Finish),
            "restart" => needs_arg(Self::Restart),
            "topic" => needs_arg(Self::Topic),
            "interrupt" => Ok(Some(Self::Interrupt)),
            "status" => Ok(Some(Self::Status)),
            "help" => Ok(Some(Self::Help)),
            "quit" | "exit" => Ok(Some(Self::Quit)),
            "rate" => arg
                .parse::<f64>()
                .map(|rate| Some(Self::Rate(rate)))
                .map_err(|_| format!("invalid rate: {arg}")),
            other => Err(format!("unknown command: /{other} (try /help)")),
        }
    }
}
