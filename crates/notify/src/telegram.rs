use async_trait::async_trait;
use chrono::Utc;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::Requester;
use teloxide::types::{ChatId, ParseMode};
use teloxide::Bot;
use tracing::info;

use common::{Direction, Error, Notifier, PatternMatch, Result};

/// Sends pattern alerts to one Telegram chat as HTML messages.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(token.into()),
            chat_id: ChatId(chat_id),
        }
    }

    async fn send_html(&self, text: String) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| Error::NotificationDelivery(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_pattern_alert(
        &self,
        pattern: &PatternMatch,
        symbol: &str,
        timeframe: &str,
        current_price: f64,
    ) -> Result<()> {
        let message = format_pattern_message(pattern, symbol, timeframe, current_price);
        self.send_html(message).await?;
        info!(symbol, timeframe, pattern = %pattern.pattern_type, "alert sent to Telegram");
        Ok(())
    }

    async fn send_startup(&self) -> Result<()> {
        let message = "\u{1F916} <b>Reversal Bot Connected!</b>\n\n\
             \u{2705} Telegram notifications are working.\n\
             \u{1F50D} Now monitoring for reversal patterns:\n\
             \u{2022} Head &amp; Shoulders (and inverse)\n\
             \u{2022} Double Tops/Bottoms\n\
             \u{2022} Triple Tops/Bottoms\n\
             \u{2022} Rounding Bottom\n\
             \u{2022} Spike (V) Patterns"
            .to_string();
        self.send_html(message).await
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        let text = format!(
            "\u{26A0} <b>BOT ERROR</b>\n\n<code>{}</code>\n\nTime: {}",
            escape_html(message),
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );
        self.send_html(text).await
    }
}

/// Build the alert text: symbol, timeframe, pattern, direction, confidence,
/// current price, the named key levels, and a LONG/SHORT suggestion.
pub fn format_pattern_message(
    pattern: &PatternMatch,
    symbol: &str,
    timeframe: &str,
    current_price: f64,
) -> String {
    let (emoji, suggestion) = match pattern.direction {
        Direction::Bullish => ("\u{1F7E2}", "LONG"),
        Direction::Bearish => ("\u{1F534}", "SHORT"),
    };

    // symbol and timeframe come from operator config, but the message is
    // HTML parse mode, so they get escaped like every other free-form field
    let mut message = format!(
        "{emoji} <b>REVERSAL PATTERN DETECTED</b> {emoji}\n\n\
         \u{1F4CA} <b>Symbol:</b> {symbol}\n\
         \u{23F0} <b>Timeframe:</b> {timeframe}\n\
         \u{1F50D} <b>Pattern:</b> {pattern_type}\n\
         \u{1F4C8} <b>Signal:</b> {direction}\n\
         \u{1F4AA} <b>Confidence:</b> {confidence:.1}%\n\n\
         \u{1F4B0} <b>Current Price:</b> ${current_price:.2}\n\n\
         <b>Key Levels:</b>\n",
        symbol = escape_html(symbol),
        timeframe = escape_html(timeframe),
        pattern_type = pattern.pattern_type,
        direction = pattern.direction,
        confidence = pattern.confidence * 100.0,
    );

    for (name, value) in &pattern.key_levels {
        message.push_str(&format!("  \u{2022} {}: ${value:.2}\n", title_case(name)));
    }

    message.push_str(&format!(
        "\n\u{1F4A1} <b>Suggestion:</b> Consider {suggestion} position\n\
         \u{1F550} <b>Time:</b> {}\n\n\
         \u{26A0} <i>Always use proper risk management!</i>",
        pattern.detected_at.format("%Y-%m-%d %H:%M:%S"),
    ));

    message
}

/// "left_shoulder" -> "Left Shoulder".
fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use common::{PatternType, Span};

    fn sample_match() -> PatternMatch {
        PatternMatch {
            pattern_type: PatternType::HeadAndShoulders,
            direction: Direction::Bearish,
            confidence: 0.9,
            key_levels: BTreeMap::from([
                ("head".to_string(), 110.0),
                ("left_shoulder".to_string(), 100.0),
                ("neckline".to_string(), 90.5),
                ("right_shoulder".to_string(), 100.0),
            ]),
            span: Span::new(3, 17),
            detected_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn bearish_alert_suggests_short() {
        let text = format_pattern_message(&sample_match(), "BTCUSDT", "4h", 36_500.25);
        assert!(text.contains("BTCUSDT"));
        assert!(text.contains("4h"));
        assert!(text.contains("Head and Shoulders"));
        assert!(text.contains("BEARISH"));
        assert!(text.contains("90.0%"));
        assert!(text.contains("$36500.25"));
        assert!(text.contains("Consider SHORT position"));
    }

    #[test]
    fn bullish_alert_suggests_long() {
        let mut m = sample_match();
        m.pattern_type = PatternType::DoubleBottom;
        m.direction = Direction::Bullish;
        let text = format_pattern_message(&m, "ETHUSDT", "1h", 2_000.0);
        assert!(text.contains("Consider LONG position"));
    }

    #[test]
    fn key_levels_are_listed_with_readable_names() {
        let text = format_pattern_message(&sample_match(), "BTCUSDT", "4h", 36_500.0);
        assert!(text.contains("Left Shoulder: $100.00"));
        assert!(text.contains("Neckline: $90.50"));
    }

    #[test]
    fn html_is_escaped_in_error_alerts() {
        assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn symbol_and_timeframe_are_html_escaped() {
        let text = format_pattern_message(&sample_match(), "BTC<&>USDT", "1h", 100.0);
        assert!(text.contains("BTC&lt;&amp;&gt;USDT"));
        assert!(!text.contains("BTC<&>USDT"));
    }
}
