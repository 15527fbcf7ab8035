use faqbot_core::{numbered_sources, truncate_answer, AnswerConfig, AnswerResponse};
use serde::{Serialize, Serializer};
use thiserror::Error;

pub const POSITIVE_FEEDBACK_BUTTON_ID: &str = "fb_positive";
pub const NEGATIVE_FEEDBACK_BUTTON_ID: &str = "fb_negative";
pub const FEEDBACK_MODAL_ID: &str = "feedback_modal";
pub const FEEDBACK_INPUT_ID: &str = "feedback_input";

pub const ANSWER_TITLE: &str = "🤖 FAQBOT Answer";
pub const ANSWER_COLOR: u32 = 0x4F545C;
pub const ANSWER_FOOTER: &str = "React below to let me know if this was helpful";
pub const SOURCES_FIELD_NAME: &str = "Sources";
pub const ERROR_TITLE: &str = "❌ Oops!";
pub const ERROR_COLOR: u32 = 0xFF0000;

pub const FEEDBACK_ACK: &str = "Thanks for your feedback!";
pub const DETAILED_FEEDBACK_ACK: &str = "Thank you for your detailed feedback!";

/// Message flag that limits visibility to the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Platform caps, counted in characters. Edits exceeding them are rejected.
pub const EMBED_DESCRIPTION_MAX_CHARS: usize = 4096;
pub const EMBED_FIELD_VALUE_MAX_CHARS: usize = 1024;

/// An answer that cannot be rendered as an embed the platform will accept.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbedError {
    #[error("answer text is empty")]
    EmptyDescription,
    #[error("embed description has {chars} chars (limit {limit})")]
    DescriptionTooLong { chars: usize, limit: usize },
    #[error("embed field `{name}` has {chars} chars (limit {limit})")]
    FieldTooLong { name: &'static str, chars: usize, limit: usize },
}

impl EmbedError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::EmptyDescription => "empty_answer",
            Self::DescriptionTooLong { .. } | Self::FieldTooLong { .. } => "embed_limit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    ActionRow = 1,
    Button = 2,
    TextInput = 4,
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

impl Serialize for ButtonStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInputStyle {
    Paragraph = 2,
}

impl Serialize for TextInputStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonComponent {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ButtonComponent {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ComponentType::Button,
            custom_id: custom_id.into(),
            label: label.into(),
            style: ButtonStyle::Secondary,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextInputComponent {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    pub label: String,
    pub style: TextInputStyle,
}

impl TextInputComponent {
    pub fn paragraph(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ComponentType::TextInput,
            custom_id: custom_id.into(),
            label: label.into(),
            style: TextInputStyle::Paragraph,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    Button(ButtonComponent),
    TextInput(TextInputComponent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Component>,
}

impl ActionRow {
    fn new(components: Vec<Component>) -> Self {
        Self { kind: ComponentType::ActionRow, components }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// Body of a reply or an edit of the original response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|flags| flags & EPHEMERAL_FLAG != 0)
    }

    pub fn custom_ids(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|row| row.components.iter())
            .map(|component| match component {
                Component::Button(button) => button.custom_id.as_str(),
                Component::TextInput(input) => input.custom_id.as_str(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalPayload {
    pub custom_id: String,
    pub title: String,
    pub components: Vec<ActionRow>,
}

#[derive(Default)]
pub struct MessageBuilder {
    payload: MessagePayload,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.payload.content = Some(content.into());
        self
    }

    pub fn embed<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut EmbedBuilder),
    {
        let mut builder = EmbedBuilder::default();
        build(&mut builder);
        self.payload.embeds.push(builder.build());
        self
    }

    pub fn action_row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionRowBuilder),
    {
        let mut builder = ActionRowBuilder::default();
        build(&mut builder);
        self.payload.components.push(ActionRow::new(builder.build()));
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.payload.flags = Some(self.payload.flags.unwrap_or(0) | EPHEMERAL_FLAG);
        self
    }

    pub fn build(self) -> MessagePayload {
        self.payload
    }
}

#[derive(Default)]
pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.embed.title = title.into();
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.embed.description = description.into();
        self
    }

    pub fn color(&mut self, color: u32) -> &mut Self {
        self.embed.color = color;
        self
    }

    pub fn footer(&mut self, text: impl Into<String>) -> &mut Self {
        self.embed.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.embed.fields.push(EmbedField { name: name.into(), value: value.into() });
        self
    }

    fn build(self) -> Embed {
        self.embed
    }
}

#[derive(Default)]
pub struct ActionRowBuilder {
    components: Vec<Component>,
}

impl ActionRowBuilder {
    pub fn button(&mut self, button: ButtonComponent) -> &mut Self {
        self.components.push(Component::Button(button));
        self
    }

    pub fn text_input(&mut self, input: TextInputComponent) -> &mut Self {
        self.components.push(Component::TextInput(input));
        self
    }

    fn build(self) -> Vec<Component> {
        self.components
    }
}

pub fn answer_message(
    response: &AnswerResponse,
    config: &AnswerConfig,
) -> Result<MessagePayload, EmbedError> {
    if response.answer.trim().is_empty() {
        return Err(EmbedError::EmptyDescription);
    }
    let description = truncate_answer(&response.answer, config);
    let chars = description.chars().count();
    if chars > EMBED_DESCRIPTION_MAX_CHARS {
        return Err(EmbedError::DescriptionTooLong { chars, limit: EMBED_DESCRIPTION_MAX_CHARS });
    }
    let sources = numbered_sources(&response.sources);
    if let Some(sources) = &sources {
        let chars = sources.chars().count();
        if chars > EMBED_FIELD_VALUE_MAX_CHARS {
            return Err(EmbedError::FieldTooLong {
                name: SOURCES_FIELD_NAME,
                chars,
                limit: EMBED_FIELD_VALUE_MAX_CHARS,
            });
        }
    }

    Ok(MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(ANSWER_TITLE)
                .description(description)
                .color(ANSWER_COLOR)
                .footer(ANSWER_FOOTER);
            if let Some(sources) = sources {
                embed.field(SOURCES_FIELD_NAME, sources);
            }
        })
        .action_row(|row| {
            row.button(
                ButtonComponent::new(POSITIVE_FEEDBACK_BUTTON_ID, "👍 Helpful")
                    .style(ButtonStyle::Success),
            )
            .button(
                ButtonComponent::new(NEGATIVE_FEEDBACK_BUTTON_ID, "👎 Unhelpful")
                    .style(ButtonStyle::Danger),
            );
        })
        .build())
}

pub fn answer_error_message() -> MessagePayload {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(ERROR_TITLE)
                .description(faqbot_core::GENERIC_ANSWER_FAILURE)
                .color(ERROR_COLOR);
        })
        .build()
}

pub fn feedback_ack_message() -> MessagePayload {
    MessageBuilder::new().content(FEEDBACK_ACK).ephemeral().build()
}

pub fn detailed_feedback_ack_message() -> MessagePayload {
    MessageBuilder::new().content(DETAILED_FEEDBACK_ACK).ephemeral().build()
}

pub fn feedback_modal() -> ModalPayload {
    let mut row = ActionRowBuilder::default();
    row.text_input(TextInputComponent::paragraph(FEEDBACK_INPUT_ID, "What could be improved?"));

    ModalPayload {
        custom_id: FEEDBACK_MODAL_ID.to_owned(),
        title: "Sorry to hear that!".to_owned(),
        components: vec![ActionRow::new(row.build())],
    }
}

#[cfg(test)]
mod tests {
    use faqbot_core::{AnswerConfig, AnswerResponse};
    use serde_json::json;

    use super::{
        answer_error_message, answer_message, feedback_ack_message, feedback_modal, ButtonStyle,
        Component, EmbedError, MessageBuilder, ANSWER_COLOR, EMBED_FIELD_VALUE_MAX_CHARS,
        ERROR_COLOR, SOURCES_FIELD_NAME,
    };

    fn response(answer: &str, sources: &[&str]) -> AnswerResponse {
        AnswerResponse {
            answer: answer.to_owned(),
            sources: sources.iter().map(|source| (*source).to_owned()).collect(),
        }
    }

    #[test]
    fn message_builder_collects_embeds_and_rows() {
        let message = MessageBuilder::new()
            .embed(|embed| {
                embed.title("t").description("d");
            })
            .action_row(|row| {
                row.button(super::ButtonComponent::new("b1", "One"));
            })
            .build();

        assert_eq!(message.embeds.len(), 1);
        assert_eq!(message.custom_ids(), vec!["b1"]);
        assert!(!message.is_ephemeral());
    }

    #[test]
    fn answer_message_has_feedback_buttons_and_sources() {
        let answer = response("Refunds take 5 days.", &["a.pdf", "b.pdf"]);
        let message = answer_message(&answer, &AnswerConfig::default()).expect("renderable");

        let embed = &message.embeds[0];
        assert_eq!(embed.description, "Refunds take 5 days.");
        assert_eq!(embed.color, ANSWER_COLOR);
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].name, SOURCES_FIELD_NAME);
        assert_eq!(embed.fields[0].value, "1. a.pdf\n2. b.pdf");
        assert_eq!(message.custom_ids(), vec!["fb_positive", "fb_negative"]);

        let styles: Vec<_> = message.components[0]
            .components
            .iter()
            .filter_map(|component| match component {
                Component::Button(button) => Some(button.style),
                Component::TextInput(_) => None,
            })
            .collect();
        assert_eq!(styles, vec![ButtonStyle::Success, ButtonStyle::Danger]);
    }

    #[test]
    fn answer_message_omits_sources_field_for_empty_list() {
        let message =
            answer_message(&response("42", &[]), &AnswerConfig::default()).expect("renderable");
        assert!(message.embeds[0].fields.is_empty());
    }

    #[test]
    fn answer_message_truncates_long_answers() {
        let config = AnswerConfig { max_chars: 5, truncation_marker: "…".to_owned() };
        let message = answer_message(&response("abcdefgh", &[]), &config).expect("renderable");
        assert_eq!(message.embeds[0].description, "abcde…");
    }

    #[test]
    fn answer_message_rejects_blank_answer() {
        for blank in ["", "  \n\t"] {
            let error = answer_message(&response(blank, &["a.pdf"]), &AnswerConfig::default())
                .expect_err("blank answer should not render");
            assert_eq!(error, EmbedError::EmptyDescription);
        }
    }

    #[test]
    fn answer_message_rejects_sources_over_field_limit() {
        let long_source = format!("https://docs.example.com/{}", "a".repeat(50));
        let sources: Vec<&str> = std::iter::repeat(long_source.as_str()).take(20).collect();

        let error = answer_message(&response("ok", &sources), &AnswerConfig::default())
            .expect_err("oversized sources field should not render");

        let EmbedError::FieldTooLong { name, chars, limit } = error else {
            panic!("expected field limit error, got {error:?}");
        };
        assert_eq!(name, SOURCES_FIELD_NAME);
        assert_eq!(limit, EMBED_FIELD_VALUE_MAX_CHARS);
        assert!(chars > limit);
    }

    #[test]
    fn answer_message_rejects_description_over_embed_limit() {
        let config = AnswerConfig { max_chars: 5000, truncation_marker: "…".to_owned() };
        let error = answer_message(&response(&"x".repeat(4200), &[]), &config)
            .expect_err("oversized description should not render");
        assert!(matches!(error, EmbedError::DescriptionTooLong { chars: 4200, limit: 4096 }));
    }

    #[test]
    fn sources_at_field_limit_still_render() {
        // "1. " prefix plus 1021 chars lands exactly on the limit.
        let source = "s".repeat(EMBED_FIELD_VALUE_MAX_CHARS - 3);
        let message = answer_message(&response("ok", &[source.as_str()]), &AnswerConfig::default())
            .expect("renderable");
        assert_eq!(message.embeds[0].fields[0].value.chars().count(), EMBED_FIELD_VALUE_MAX_CHARS);
    }

    #[test]
    fn error_message_has_no_controls() {
        let message = answer_error_message();
        assert!(message.components.is_empty());
        assert_eq!(message.embeds[0].color, ERROR_COLOR);
        assert_eq!(message.embeds[0].title, "❌ Oops!");
    }

    #[test]
    fn ack_is_ephemeral_and_serializes_flag() {
        let message = feedback_ack_message();
        assert!(message.is_ephemeral());

        let body = serde_json::to_value(&message).expect("json");
        assert_eq!(body["flags"], json!(64));
        assert_eq!(body["content"], json!("Thanks for your feedback!"));
    }

    #[test]
    fn components_serialize_with_numeric_discord_types() {
        let message =
            answer_message(&response("x", &[]), &AnswerConfig::default()).expect("renderable");
        let body = serde_json::to_value(&message).expect("json");

        assert_eq!(
            body["components"],
            json!([{
                "type": 1,
                "components": [
                    { "type": 2, "custom_id": "fb_positive", "label": "👍 Helpful", "style": 3 },
                    { "type": 2, "custom_id": "fb_negative", "label": "👎 Unhelpful", "style": 4 }
                ]
            }])
        );
    }

    #[test]
    fn feedback_modal_has_single_paragraph_input() {
        let body = serde_json::to_value(feedback_modal()).expect("json");
        assert_eq!(
            body,
            json!({
                "custom_id": "feedback_modal",
                "title": "Sorry to hear that!",
                "components": [{
                    "type": 1,
                    "components": [{
                        "type": 4,
                        "custom_id": "feedback_input",
                        "label": "What could be improved?",
                        "style": 2
                    }]
                }]
            })
        );
    }
}
