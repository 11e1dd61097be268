/// Commands honored from every dialog state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCommand {
    Greeting,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommandDef {
    command: GlobalCommand,
    patterns: &'static [&'static str],
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        command: GlobalCommand::Greeting,
        patterns: &["oi"],
    },
    CommandDef {
        command: GlobalCommand::Menu,
        patterns: &["menu"],
    },
];

/// Matches the whole normalized message against the global command table.
pub fn parse_global_command(text: &str) -> Option<GlobalCommand> {
    let normalized = normalize(text);

    COMMAND_DEFS.iter().find_map(|def| {
        def.patterns
            .iter()
            .any(|pattern| normalized == *pattern)
            .then_some(def.command)
    })
}

/// Yes/no answer as accepted by the confirmation prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
}

pub fn parse_confirmation(text: &str) -> Option<Confirmation> {
    match normalize(text).as_str() {
        "sim" => Some(Confirmation::Yes),
        "não" | "nao" => Some(Confirmation::No),
        _ => None,
    }
}

/// Trims surrounding whitespace and case-folds.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
