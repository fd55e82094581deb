//! Default prompt for reply generation.

/// Default prompt. `{reply}` is replaced with the text being answered.
pub const DEFAULT_REPLY_PROMPT: &str = r#"Someone replied to one of our posts on social media:

"{reply}"

Write a single short reply to them. Stay under 280 characters. Do not use hashtags, do not wrap the reply in quotes, and do not include any other text or commentary."#;
