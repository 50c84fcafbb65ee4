use hoststat_core::HostView;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Index into the host list (zero based).
    Select(usize),
    Deselect,
    List,
    Quit,
    Invalid(String),
}

/// Parses one line typed by the user. Hosts are numbered from 1 on screen.
pub fn parse_command(line: &str, host_count: usize) -> Option<Command> {
    let line = line.trim();
    let cmd = match line {
        "" => return None,
        "q" | "quit" | "exit" => Command::Quit,
        "d" | "deselect" => Command::Deselect,
        "l" | "list" => Command::List,
        _ => match line.parse::<usize>() {
            Ok(n) if (1..=host_count).contains(&n) => Command::Select(n - 1),
            Ok(n) => Command::Invalid(format!("no host number {n}")),
            Err(_) => Command::Invalid(format!("unknown command '{line}'")),
        },
    };
    Some(cmd)
}

pub fn host_list(hosts: &[HostView]) -> String {
    let mut out = String::from("Servers:\n");
    if hosts.is_empty() {
        out.push_str("  (none registered)\n");
    }
    for (i, host) in hosts.iter().enumerate() {
        let _ = write!(out, "  {}. {} [{}]", i + 1, host.name(), host.record.ip);
        if !host.record.desc.is_empty() {
            let _ = write!(out, " - {}", host.record.desc);
        }
        out.push('\n');
    }
    out.push_str("Enter a number to follow a host, d to deselect, l to list, q to quit.");
    out
}
