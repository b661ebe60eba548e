//! `:` commands and their autocomplete.

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "goals",
    aliases: &["g", "goal"],
    description: "Daily goals for the selected date",
  },
  Command {
    name: "todos",
    aliases: &["t", "todo", "tasks"],
    description: "Todo list",
  },
  Command {
    name: "today",
    aliases: &["now"],
    description: "Jump the goal list back to today",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit daybook",
  },
];

/// Match quality of `input` against a command; lower is better.
fn match_rank(cmd: &Command, input: &str) -> Option<u8> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Commands matching `input`, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input).map(|rank| (rank, cmd)))
    .collect();
  // Stable sort keeps declaration order among equal ranks
  ranked.sort_by_key(|(rank, _)| *rank);

  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}
