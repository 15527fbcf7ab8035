use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{error, info};

pub const ASK_COMMAND_NAME: &str = "ask";
pub const QUERY_OPTION_NAME: &str = "query";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandType {
    ChatInput = 1,
}

impl Serialize for CommandType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOptionType {
    String = 3,
}

impl Serialize for CommandOptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    #[serde(rename = "type")]
    pub kind: CommandType,
    pub name: String,
    pub description: String,
    pub options: Vec<CommandOption>,
}

pub fn ask_command() -> CommandDefinition {
    CommandDefinition {
        kind: CommandType::ChatInput,
        name: ASK_COMMAND_NAME.to_owned(),
        description: "Ask the RAG bot a question".to_owned(),
        options: vec![CommandOption {
            kind: CommandOptionType::String,
            name: QUERY_OPTION_NAME.to_owned(),
            description: "Your question".to_owned(),
            required: true,
        }],
    }
}

/// Every command the bot publishes.
pub fn command_set() -> Vec<CommandDefinition> {
    vec![ask_command()]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandScope {
    pub application_id: String,
    pub guild_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("command registration request failed: {0}")]
    Transport(String),
    #[error("command registration rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait CommandRegistry: Send + Sync {
    /// Replaces the scope's command set; publishing the same set twice is a no-op.
    async fn publish(
        &self,
        scope: &CommandScope,
        commands: &[CommandDefinition],
    ) -> Result<(), RegistrationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { count: usize },
    Failed { error: RegistrationError },
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

/// Publishes [`command_set`] to the guild scope. Failures are logged and
/// returned as an outcome, never as an error.
pub async fn register_commands(
    registry: &dyn CommandRegistry,
    scope: &CommandScope,
) -> RegistrationOutcome {
    let commands = command_set();
    info!(
        event_name = "system.commands.registering",
        correlation_id = "bootstrap",
        application_id = %scope.application_id,
        guild_id = %scope.guild_id,
        command_count = commands.len(),
        "registering slash commands"
    );

    match registry.publish(scope, &commands).await {
        Ok(()) => {
            info!(
                event_name = "system.commands.registered",
                correlation_id = "bootstrap",
                guild_id = %scope.guild_id,
                command_count = commands.len(),
                "slash commands registered"
            );
            RegistrationOutcome::Registered { count: commands.len() }
        }
        Err(registration_error) => {
            error!(
                event_name = "system.commands.registration_failed",
                correlation_id = "bootstrap",
                guild_id = %scope.guild_id,
                error = %registration_error,
                "failed to register slash commands; continuing without registration"
            );
            RegistrationOutcome::Failed { error: registration_error }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::{
        ask_command, register_commands, CommandDefinition, CommandRegistry, CommandScope,
        RegistrationError, RegistrationOutcome,
    };

    #[derive(Default)]
    struct ScriptedRegistry {
        published: Mutex<Vec<(CommandScope, Vec<CommandDefinition>)>>,
        failure: Option<RegistrationError>,
    }

    #[async_trait]
    impl CommandRegistry for ScriptedRegistry {
        async fn publish(
            &self,
            scope: &CommandScope,
            commands: &[CommandDefinition],
        ) -> Result<(), RegistrationError> {
            self.published.lock().expect("registry lock").push((scope.clone(), commands.to_vec()));
            match &self.failure {
                Some(failure) => Err(failure.clone()),
                None => Ok(()),
            }
        }
    }

    fn scope() -> CommandScope {
        CommandScope {
            application_id: "1100000000000000001".to_owned(),
            guild_id: "1200000000000000002".to_owned(),
        }
    }

    #[test]
    fn ask_command_schema_matches_platform_shape() {
        let body = serde_json::to_value(ask_command()).expect("json");
        assert_eq!(
            body,
            json!({
                "type": 1,
                "name": "ask",
                "description": "Ask the RAG bot a question",
                "options": [{
                    "type": 3,
                    "name": "query",
                    "description": "Your question",
                    "required": true
                }]
            })
        );
    }

    #[tokio::test]
    async fn registration_publishes_single_ask_command_to_scope() {
        let registry = ScriptedRegistry::default();

        let outcome = register_commands(&registry, &scope()).await;

        assert_eq!(outcome, RegistrationOutcome::Registered { count: 1 });
        let published = registry.published.lock().expect("registry lock");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, scope());
        assert_eq!(published[0].1[0].name, "ask");
    }

    #[tokio::test]
    async fn registration_failure_is_reported_not_raised() {
        let registry = ScriptedRegistry {
            failure: Some(RegistrationError::Rejected {
                status: 401,
                body: "401: Unauthorized".to_owned(),
            }),
            ..ScriptedRegistry::default()
        };

        let outcome = register_commands(&registry, &scope()).await;

        assert!(!outcome.is_registered());
        assert!(matches!(
            outcome,
            RegistrationOutcome::Failed { error: RegistrationError::Rejected { status: 401, .. } }
        ));
    }
}
