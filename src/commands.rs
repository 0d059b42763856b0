/// Shell commands, aliases and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All commands understood by the interactive shell
pub const COMMANDS: &[Command] = &[
  Command {
    name: "login",
    aliases: &["signin"],
    description: "Sign in with username and password",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "Forget the current session",
  },
  Command {
    name: "whoami",
    aliases: &["me"],
    description: "Show the signed-in user",
  },
  Command {
    name: "refresh",
    aliases: &[],
    description: "Renew the access token",
  },
  Command {
    name: "products",
    aliases: &["p", "product"],
    description: "List, show, search and edit products",
  },
  Command {
    name: "settings",
    aliases: &["set", "config"],
    description: "Show or change preferences",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Leave the shell",
  },
];

/// Canonical name for an exact command name or alias
pub fn resolve(input: &str) -> Option<&'static str> {
  let input_lower = input.to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input_lower || cmd.aliases.contains(&input_lower.as_str()))
    .map(|cmd| cmd.name)
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }
  }

  // Stable sort keeps table order within a priority
  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Split a shell line into words. Single or double quotes group words;
/// an unterminated quote runs to the end of the line.
pub fn split_words(line: &str) -> Vec<String> {
  let mut words = Vec::new();
  let mut current = String::new();
  let mut quote: Option<char> = None;
  let mut in_word = false;

  for c in line.chars() {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => current.push(c),
      None if c == '"' || c == '\'' => {
        quote = Some(c);
        in_word = true;
      }
      None if c.is_whitespace() => {
        if in_word {
          words.push(std::mem::take(&mut current));
          in_word = false;
        }
      }
      None => {
        current.push(c);
        in_word = true;
      }
    }
  }
  if in_word {
    words.push(current);
  }
  words
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("products");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "products");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("p");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "products");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("log");
    let names: Vec<_> = suggestions.iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["login", "logout"]);
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ami");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "whoami");
  }

  #[test]
  fn test_resolve() {
    assert_eq!(resolve("P"), Some("products"));
    assert_eq!(resolve("exit"), Some("quit"));
    assert_eq!(resolve("prod"), None);
  }

  #[test]
  fn test_split_words() {
    assert_eq!(
      split_words(r#"products add --title "Red Pen" --price 2"#),
      vec!["products", "add", "--title", "Red Pen", "--price", "2"]
    );
    assert_eq!(split_words("  a   b "), vec!["a", "b"]);
    assert_eq!(split_words("search ''"), vec!["search", ""]);
    assert!(split_words("   ").is_empty());
  }
}
