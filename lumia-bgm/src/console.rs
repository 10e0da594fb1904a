//! Line commands for the interactive driver
//!
//! ```text
//! route <route> [focus|blur]   navigation (focus when omitted)
//! index <n>                    visible page of the focused paged route
//! enable on|off                music switch
//! select <track>               background track
//! status                       print session status
//! quit                         tear down and exit
//! ```

use lumia_common::events::SessionStatus;
use lumia_common::TrackId;

use crate::error::{Error, Result};
use crate::service::BackgroundMusic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Route { route: String, focused: bool },
    Index(usize),
    Enable(bool),
    Select(TrackId),
    Status,
    Quit,
}

/// What the driver does after a command has been applied
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Continue,
    Status(SessionStatus),
    Quit,
}

/// Apply `command` to the service before returning
///
/// Commands reach the gate in the order they are applied.
pub fn apply_command(service: &BackgroundMusic, command: ConsoleCommand) -> Result<CommandOutcome> {
    match command {
        ConsoleCommand::Route { route, focused } => service.notify_route_change(&route, focused),
        ConsoleCommand::Index(index) => service.notify_visible_index(index),
        ConsoleCommand::Enable(enabled) => service.set_enabled(enabled),
        ConsoleCommand::Select(track) => service.select_track(track)?,
        ConsoleCommand::Status => return Ok(CommandOutcome::Status(service.status())),
        ConsoleCommand::Quit => return Ok(CommandOutcome::Quit),
    }
    Ok(CommandOutcome::Continue)
}

/// Parse one input line; blank lines yield `Ok(None)`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("route", [route]) => ConsoleCommand::Route {
            route: route.to_string(),
            focused: true,
        },
        ("route", [route, "focus"]) => ConsoleCommand::Route {
            route: route.to_string(),
            focused: true,
        },
        ("route", [route, "blur"]) => ConsoleCommand::Route {
            route: route.to_string(),
            focused: false,
        },
        ("index", [n]) => ConsoleCommand::Index(
            n.parse()
                .map_err(|_| Error::InvalidCommand(format!("not a page index: {}", n)))?,
        ),
        ("enable", ["on"]) => ConsoleCommand::Enable(true),
        ("enable", ["off"]) => ConsoleCommand::Enable(false),
        ("select", [id]) => ConsoleCommand::Select(
            id.parse()
                .map_err(|_| Error::InvalidCommand(format!("not a track id: {}", id)))?,
        ),
        ("status", []) => ConsoleCommand::Status,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        _ => return Err(Error::InvalidCommand(line.trim().to_string())),
    };

    Ok(Some(command))
}
