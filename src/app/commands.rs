//! Inbound console commands.
//!
//! A line from the serial console (or a telnet session) is split on
//! whitespace and its first token is looked up in [`COMMANDS`].

/// Commands the console can send into the provisioning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Fetch MAC, serial number and password from the manufacturing server.
    GetSnMac,
    /// Print the device identity and stored provisioning data.
    ShowIdentity,
    /// List the available commands.
    Help,
}

/// One row of the console command table.
pub struct CommandSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub command: AppCommand,
}

/// Console command table.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "?",
        help: "Print this list",
        command: AppCommand::Help,
    },
    CommandSpec {
        name: "help",
        help: "Print this list",
        command: AppCommand::Help,
    },
    CommandSpec {
        name: "getmac",
        help: "Get MAC, serial number and password from the manufacturing server",
        command: AppCommand::GetSnMac,
    },
    CommandSpec {
        name: "identity",
        help: "Print CPU id, product id, serial number and MAC",
        command: AppCommand::ShowIdentity,
    },
];

impl AppCommand {
    /// Parse a console line.  `None` for blank lines and unknown commands.
    pub fn parse(line: &str) -> Option<Self> {
        let token = line.split_whitespace().next()?;
        COMMANDS
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(token))
            .map(|spec| spec.command)
    }
}
