// File: ./src/cli.rs
//! Shared command-line interface logic, like printing help.

pub fn print_help(binary_name: &str) {
    println!(
        "Episodic v{} - Weekly status tracker for the series you follow",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] <command> [args]", binary_name);
    println!();
    println!("COMMANDS:");
    println!("    list                  Show tracked series and where they were loaded from.");
    println!("    add <name>            Start tracking a series.");
    println!("    remove <name>         Stop tracking a series.");
    println!("    check                 Look up the status of every tracked series now.");
    println!("    notifications         Toggle the weekly check notifications.");
    println!("    status                Show settings, notification permission and next check.");
    println!("    daemon                Run the weekly check until interrupted (Ctrl-C).");
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("EXAMPLES:");
    println!("    {} add \"Severance\"", binary_name);
    println!("    {} check", binary_name);
    println!("    {} --root /tmp/episodic daemon", binary_name);
    println!();
    println!("CONFIGURATION:");
    println!("    The config file (config.toml) lives in the config directory, or under");
    println!("    <path>/config when --root is given. Leave gateway_url empty to keep");
    println!("    the list on this machine only.");
}

/// Splits `args` (without the program name) into the root override and the
/// remaining positional words. Unknown flags are ignored.
pub fn split_args(args: &[String]) -> (Option<std::path::PathBuf>, Vec<String>) {
    let mut override_root = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--root" | "-r" => {
                if i + 1 < args.len() {
                    override_root = Some(args[i + 1].clone().into());
                    i += 1; // Also consumed the value
                }
            }
            arg if !arg.starts_with('-') => rest.push(arg.to_string()),
            _ => { /* Ignore unknown flags */ }
        }
        i += 1;
    }

    (override_root, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_args_extracts_root() {
        let (root, rest) = split_args(&strings(&["-r", "/tmp/x", "add", "The", "Bear"]));
        assert_eq!(root, Some(PathBuf::from("/tmp/x")));
        assert_eq!(rest, strings(&["add", "The", "Bear"]));
    }

    #[test]
    fn test_split_args_dangling_root_is_ignored() {
        let (root, rest) = split_args(&strings(&["list", "--root"]));
        assert_eq!(root, None);
        assert_eq!(rest, strings(&["list"]));
    }
}
