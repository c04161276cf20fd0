//! Inbound command vocabulary and its validation.
//!
//! Every command a client may send is listed once in [`COMMANDS`]. Resolving a
//! `(command, parameter)` pair against that table yields the structured
//! [`Action`] to run, or the reason it must not run.

mod action;

pub use action::{Action, ActionRunner, Invocation, ScriptRunner, Service, ServiceVerb};

/// What a command does once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Start or stop a supervised service
    ServiceToggle(Service),
    /// Replay a token as if it had been swiped
    TokenReplay,
    FolderPlay { recursive: bool },
    /// Forwarded to the playout control script unchanged
    Passthrough,
    /// List the available commands
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub takes_parameter: bool,
    pub kind: CommandKind,
}

impl CommandDescriptor {
    const fn plain(name: &'static str) -> Self {
        Self {
            name,
            takes_parameter: false,
            kind: CommandKind::Passthrough,
        }
    }

    const fn with_parameter(name: &'static str, kind: CommandKind) -> Self {
        Self {
            name,
            takes_parameter: true,
            kind,
        }
    }

    /// Whether the parameter is checked before dispatch.
    #[must_use]
    pub fn validated(&self) -> bool {
        matches!(self.kind, CommandKind::ServiceToggle(_))
    }
}

pub const HELP: &str = "help";

/// Every accepted command, parameterless ones first.
pub const COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor {
        name: HELP,
        takes_parameter: false,
        kind: CommandKind::Help,
    },
    CommandDescriptor::plain("volumeup"),
    CommandDescriptor::plain("volumedown"),
    CommandDescriptor::plain("mute"),
    CommandDescriptor::plain("playerplay"),
    CommandDescriptor::plain("playerpause"),
    CommandDescriptor::plain("playernext"),
    CommandDescriptor::plain("playerprev"),
    CommandDescriptor::plain("playerstop"),
    CommandDescriptor::plain("playerrewind"),
    CommandDescriptor::plain("playershuffle"),
    CommandDescriptor::plain("playerreplay"),
    CommandDescriptor::plain("scan"),
    CommandDescriptor::plain("shutdown"),
    CommandDescriptor::plain("shutdownsilent"),
    CommandDescriptor::plain("reboot"),
    CommandDescriptor::plain("disablewifi"),
    CommandDescriptor::with_parameter("setvolume", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("setvolstep", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("setmaxvolume", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("setidletime", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("playerseek", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("shutdownafter", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("shutdownvolumereduction", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("playerstopafter", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("playerrepeat", CommandKind::Passthrough),
    CommandDescriptor::with_parameter("rfid", CommandKind::ServiceToggle(Service::Rfid)),
    CommandDescriptor::with_parameter("gpio", CommandKind::ServiceToggle(Service::Gpio)),
    CommandDescriptor::with_parameter("swipecard", CommandKind::TokenReplay),
    CommandDescriptor::with_parameter("playfolder", CommandKind::FolderPlay { recursive: false }),
    CommandDescriptor::with_parameter(
        "playfolderrecursive",
        CommandKind::FolderPlay { recursive: true },
    ),
];

#[must_use]
pub fn lookup(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|descriptor| descriptor.name == name)
}

fn listing(takes_parameter: bool) -> String {
    COMMANDS
        .iter()
        .filter(|d| d.takes_parameter == takes_parameter && d.kind != CommandKind::Help)
        .map(|d| d.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Published to `available_commands`.
#[must_use]
pub fn commands_listing() -> String {
    listing(false)
}

/// Published to `available_commands_with_params`.
#[must_use]
pub fn commands_with_params_listing() -> String {
    listing(true)
}

/// Why an inbound message was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidParameter,
    UnknownAttribute,
    AttributeUnavailable,
    PlayerUnreachable,
}

/// Result of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched,
    Rejected(Rejection),
    Unknown,
}

/// A command checked against [`COMMANDS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Help,
    Run(Action),
    Rejected(Rejection),
    Unknown,
}

/// Validate `command` with `parameter` and build the action to run.
///
/// `command` must already be lower-cased. Parameterless commands ignore the
/// parameter. Passthrough parameters are forwarded even when empty.
#[must_use]
pub fn resolve(command: &str, parameter: &str) -> Resolved {
    let Some(descriptor) = lookup(command) else {
        return Resolved::Unknown;
    };

    let action = match descriptor.kind {
        CommandKind::Help => return Resolved::Help,
        CommandKind::ServiceToggle(service) => match ServiceVerb::parse(parameter) {
            Some(verb) => Action::Service { service, verb },
            None => return Resolved::Rejected(Rejection::InvalidParameter),
        },
        CommandKind::TokenReplay => Action::SwipeCard {
            card_id: parameter.to_string(),
        },
        CommandKind::FolderPlay { recursive } => Action::PlayFolder {
            folder: parameter.to_string(),
            recursive,
        },
        CommandKind::Passthrough => Action::Playout {
            command: descriptor.name,
            value: descriptor.takes_parameter.then(|| parameter.to_string()),
        },
    };

    Resolved::Run(action)
}
