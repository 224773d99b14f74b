use crate::bootstrap::Registry;

/// Prints the commands registered at startup, one per line.
pub fn run(registry: &Registry) {
    let width = registry
        .commands()
        .iter()
        .map(|command| command.name.len())
        .max()
        .unwrap_or(0);

    for command in registry.commands() {
        println!("{:<width$}  {}", command.name, command.about);
    }
}
