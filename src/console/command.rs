//! Slash command parsing for the operator console.

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Workers,
    Select(i64),
    Spawn(String),
    Toggle(i64),
    Delete { id: i64, force: bool },
    Task { skill: Option<String>, prompt: String },
    TaskDelete(i64),
    Capture,
    Shots(Option<i64>),
    History(Option<i64>),
    Detail(Option<i64>),
    Output,
    Scroll(i64),
    /// Output panel height in rows.
    Rows(u32),
    Latest,
    Login { email: String, password: String },
    Register { email: String, password: String, confirm: String },
    Logout,
    Me,
    Passwd { current: String, new: String },
    Stats,
    Help,
    Quit,
    /// Not understood; carries a usage hint.
    Invalid(String),
}

/// Parse one input line. Lines without a leading `/` are task prompts.
pub fn parse(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Task {
            skill: None,
            prompt: line.to_string(),
        };
    };
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let words: Vec<&str> = args.split_whitespace().collect();

    match name.to_ascii_lowercase().as_str() {
        "workers" | "ls" => Command::Workers,
        "select" => id_arg(&words, "/select <id>").map_or_else(Command::Invalid, Command::Select),
        "spawn" if !args.is_empty() => Command::Spawn(args.to_string()),
        "spawn" => Command::Invalid("usage: /spawn <name>".into()),
        "toggle" => id_arg(&words, "/toggle <id>").map_or_else(Command::Invalid, Command::Toggle),
        "delete" => {
            let force = words.contains(&"--force");
            let rest: Vec<&str> = words.iter().copied().filter(|w| *w != "--force").collect();
            id_arg(&rest, "/delete <id> [--force]")
                .map_or_else(Command::Invalid, |id| Command::Delete { id, force })
        }
        "task" => parse_task(args),
        "task-delete" => {
            id_arg(&words, "/task-delete <id>").map_or_else(Command::Invalid, Command::TaskDelete)
        }
        "capture" => Command::Capture,
        "shots" => optional_id(&words, "/shots [id]").map_or_else(Command::Invalid, Command::Shots),
        "history" => {
            optional_id(&words, "/history [id]").map_or_else(Command::Invalid, Command::History)
        }
        "detail" => optional_id(&words, "/detail [id]").map_or_else(Command::Invalid, Command::Detail),
        "output" => Command::Output,
        "scroll" => match words.as_slice() {
            [n] => n
                .parse()
                .map(Command::Scroll)
                .unwrap_or_else(|_| Command::Invalid("usage: /scroll <±rows>".into())),
            _ => Command::Invalid("usage: /scroll <±rows>".into()),
        },
        "rows" => match words.as_slice() {
            [n] => match n.parse::<u32>() {
                Ok(rows) if rows > 0 => Command::Rows(rows),
                _ => Command::Invalid("usage: /rows <rows>".into()),
            },
            _ => Command::Invalid("usage: /rows <rows>".into()),
        },
        "latest" => Command::Latest,
        "login" => match words.as_slice() {
            [email, password] => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => Command::Invalid("usage: /login <email> <password>".into()),
        },
        "register" => match words.as_slice() {
            [email, password, confirm] => Command::Register {
                email: email.to_string(),
                password: password.to_string(),
                confirm: confirm.to_string(),
            },
            _ => Command::Invalid("usage: /register <email> <password> <confirm>".into()),
        },
        "logout" => Command::Logout,
        "me" => Command::Me,
        "passwd" => match words.as_slice() {
            [current, new] => Command::Passwd {
                current: current.to_string(),
                new: new.to_string(),
            },
            _ => Command::Invalid("usage: /passwd <current> <new>".into()),
        },
        "stats" => Command::Stats,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{other}")),
    }
}

fn parse_task(args: &str) -> Command {
    let usage = || Command::Invalid("usage: /task [--skill <id>] <prompt>".into());
    let Some(after) = args.strip_prefix("--skill") else {
        return Command::Task {
            skill: None,
            prompt: args.to_string(),
        };
    };
    let after = after.trim_start();
    let Some((skill, prompt)) = after.split_once(char::is_whitespace) else {
        return usage();
    };
    if skill.is_empty() {
        return usage();
    }
    Command::Task {
        skill: Some(skill.to_string()),
        prompt: prompt.trim().to_string(),
    }
}

fn id_arg(words: &[&str], usage: &str) -> Result<i64, String> {
    match words {
        [id] => id.parse().map_err(|_| format!("usage: {usage}")),
        _ => Err(format!("usage: {usage}")),
    }
}

fn optional_id(words: &[&str], usage: &str) -> Result<Option<i64>, String> {
    match words {
        [] => Ok(None),
        _ => id_arg(words, usage).map(Some),
    }
}
