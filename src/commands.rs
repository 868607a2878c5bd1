/// Available `:` commands and autocomplete logic
use crate::config::ScreenKind;

/// What a command does once submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Open(ScreenKind),
  Refresh,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "roles",
    aliases: &["r", "role"],
    description: "Staff roles and permissions",
    action: Action::Open(ScreenKind::Roles),
  },
  Command {
    name: "categories",
    aliases: &["c", "cat", "category"],
    description: "Product categories",
    action: Action::Open(ScreenKind::Categories),
  },
  Command {
    name: "suppliers",
    aliases: &["s", "sup", "supplier", "vendors"],
    description: "Suppliers and contacts",
    action: Action::Open(ScreenKind::Suppliers),
  },
  Command {
    name: "doctors",
    aliases: &["d", "doc", "doctor"],
    description: "Doctors and specializations",
    action: Action::Open(ScreenKind::Doctors),
  },
  Command {
    name: "attendance",
    aliases: &["a", "att", "staff"],
    description: "Daily staff attendance",
    action: Action::Open(ScreenKind::Attendance),
  },
  Command {
    name: "refresh",
    aliases: &["reload"],
    description: "Refresh the current screen now",
    action: Action::Refresh,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit adminsync",
    action: Action::Quit,
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let priority = if cmd.name == input_lower {
      0
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, priority));
  }

  // Stable sort keeps declaration order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
