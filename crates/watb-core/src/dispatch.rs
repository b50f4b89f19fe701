//! Command grammar and message dispatch.
//!
//! Every inbound message is parsed exactly once into a `Command`; the
//! dispatcher then validates arguments and produces at most one chat reply.

use std::sync::Arc;

use regex::Regex;

use crate::domain::InboundMessage;
use crate::formatting;
use crate::langs::{self, LangCode};
use crate::prefs::PreferenceStore;
use crate::session::ReplyPort;
use crate::translate::TranslationGateway;
use crate::Result;

/// A parsed inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `!translate <text...> [lang]` or `!t <text...> [lang]`. `target` is
    /// set when the trailing token is a registered code; `text` may then be
    /// empty. Both empty means the command carried no arguments at all.
    Translate {
        text: String,
        target: Option<LangCode>,
    },
    /// `!setlang ...` with its raw argument tokens, validated on dispatch.
    SetLang { args: Vec<String> },
    Help,
    /// `!<code>` as the entire body of a reply to another message. The code
    /// may still be unregistered.
    ReplyShorthand { code: LangCode },
    Unrecognized,
}

impl Command {
    /// Parses a message body. Command words are matched case-sensitively on
    /// the first whitespace token; the reply shorthand must span the whole
    /// body and only exists when the message quotes another one.
    pub fn parse(body: &str, has_quote: bool) -> Command {
        let body = body.trim();
        let tokens: Vec<&str> = body.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return Command::Unrecognized;
        };

        match *first {
            "!translate" | "!t" => {
                let args = &tokens[1..];
                if args.is_empty() {
                    return Command::Translate {
                        text: String::new(),
                        target: None,
                    };
                }
                let trailing = LangCode::new(args[args.len() - 1]);
                if langs::is_supported(&trailing) {
                    Command::Translate {
                        text: args[..args.len() - 1].join(" "),
                        target: Some(trailing),
                    }
                } else {
                    Command::Translate {
                        text: args.join(" "),
                        target: None,
                    }
                }
            }
            "!setlang" => Command::SetLang {
                args: tokens[1..].iter().map(|s| s.to_string()).collect(),
            },
            "!help" => Command::Help,
            _ => {
                if has_quote {
                    let shorthand =
                        Regex::new(r"^!([a-zA-Z]{2}(?:-[a-zA-Z]{2})?)$").expect("valid regex");
                    if let Some(caps) = shorthand.captures(body) {
                        return Command::ReplyShorthand {
                            code: LangCode::new(&caps[1]),
                        };
                    }
                }
                Command::Unrecognized
            }
        }
    }
}

pub struct Dispatcher {
    gateway: Arc<TranslationGateway>,
    prefs: Arc<PreferenceStore>,
    replies: Arc<dyn ReplyPort>,
    show_original: bool,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<TranslationGateway>,
        prefs: Arc<PreferenceStore>,
        replies: Arc<dyn ReplyPort>,
        show_original: bool,
    ) -> Self {
        Self {
            gateway,
            prefs,
            replies,
            show_original,
        }
    }

    /// Handles one inbound message end to end. Validation failures are
    /// replied to the sender; an `Err` here means the reply itself failed.
    pub async fn handle(&self, msg: InboundMessage) -> Result<()> {
        if msg.from_me {
            return Ok(());
        }
        tracing::debug!(chat = %msg.chat.0, "inbound message");

        match Command::parse(&msg.body, msg.quoted.is_some()) {
            Command::Translate { text, target } => self.translate(&msg, text, target).await,
            Command::SetLang { args } => self.setlang(&msg, &args).await,
            Command::Help => {
                let help = formatting::help_text(self.prefs.default_lang());
                self.reply(&msg, &help).await
            }
            Command::ReplyShorthand { code } => self.shorthand(&msg, code).await,
            Command::Unrecognized => Ok(()),
        }
    }

    async fn translate(
        &self,
        msg: &InboundMessage,
        text: String,
        target: Option<LangCode>,
    ) -> Result<()> {
        if text.is_empty() && target.is_none() {
            return self.reply(msg, formatting::USAGE_TRANSLATE).await;
        }
        let target = match target {
            Some(code) => code,
            None => self.prefs.get(&msg.chat).await,
        };
        let outcome = self.gateway.translate(&text, &target, None).await;
        self.reply(
            msg,
            &formatting::translation_reply(&text, &outcome, self.show_original),
        )
        .await
    }

    async fn setlang(&self, msg: &InboundMessage, args: &[String]) -> Result<()> {
        if args.len() != 1 {
            return self.reply(msg, formatting::USAGE_SETLANG).await;
        }
        let code = LangCode::new(&args[0]);
        let Some(name) = langs::resolve(&code) else {
            return self.reply(msg, &formatting::invalid_code()).await;
        };
        self.prefs.set(msg.chat.clone(), code.clone()).await;
        self.reply(msg, &formatting::setlang_confirmation(name, &code))
            .await
    }

    async fn shorthand(&self, msg: &InboundMessage, code: LangCode) -> Result<()> {
        if !langs::is_supported(&code) {
            return self.reply(msg, &formatting::invalid_code()).await;
        }
        let Some(quoted) = &msg.quoted else {
            return Ok(());
        };
        if quoted.body.is_empty() {
            return self.reply(msg, formatting::EMPTY_QUOTE).await;
        }
        let outcome = self.gateway.translate(&quoted.body, &code, None).await;
        self.reply(
            msg,
            &formatting::translation_reply(&quoted.body, &outcome, self.show_original),
        )
        .await
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> Result<()> {
        self.replies.reply(&msg.chat, text, Some(&msg.id)).await
    }
}
