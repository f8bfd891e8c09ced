use crate::command::RemediationCommand;
use std::collections::HashMap;
use std::sync::Arc;

/// Remediation commands by name.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn RemediationCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command. Returns error if name already registered.
    pub fn register(&mut self, command: impl RemediationCommand + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(command))
    }

    pub fn register_arc(&mut self, command: Arc<dyn RemediationCommand>) -> Result<(), RegistryError> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RemediationCommand>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Command with name '{0}' is already registered")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandError, CommandOutcome, CommandRequest};
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl RemediationCommand for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _request: &CommandRequest) -> Result<CommandOutcome, CommandError> {
            Ok(CommandOutcome::success(""))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register(Noop("flush-dns")).unwrap();
        registry.register(Noop("cleanup-disk")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("flush-dns").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["cleanup-disk", "flush-dns"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = CommandRegistry::new();
        registry.register(Noop("flush-dns")).unwrap();
        assert!(matches!(
            registry.register(Noop("flush-dns")),
            Err(RegistryError::DuplicateName(n)) if n == "flush-dns"
        ));
    }
}
