/// WhatsApp chat/sender id (string form, e.g. `6281234567890@c.us`).
///
/// Opaque to the core: used only as a mapping key and a reply address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

/// WhatsApp message id (opaque serialized id from the session layer).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

/// Payload of the message an inbound message replies to, as far as the
/// session layer surfaces it.
#[derive(Clone, Debug, Default)]
pub struct QuotedMessage {
    pub body: String,
}

/// One inbound chat message as delivered by the session layer.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub id: MessageId,
    pub chat: ChatId,
    pub body: String,
    /// Originated from the bot's own account.
    pub from_me: bool,
    pub quoted: Option<QuotedMessage>,
}
