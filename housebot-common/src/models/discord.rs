use chrono::{DateTime, Utc};

/// Platform-neutral description of a Discord embed. The Discord runtime
/// converts it with twilight's builders; tests inspect it directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscordEmbed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<DiscordColor>,
    pub author: Option<DiscordEmbedAuthor>,
    pub image: Option<DiscordEmbedImage>,
    pub fields: Vec<DiscordEmbedField>,
    pub footer: Option<DiscordEmbedFooter>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl DiscordEmbed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) {
        self.fields.push(DiscordEmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
    }

    pub fn field(&self, name: &str) -> Option<&DiscordEmbedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordEmbedAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordEmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscordEmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscordColor(pub u32);

impl DiscordColor {
    pub const TWITCH_PURPLE: DiscordColor = DiscordColor(0x9146FF);
    pub const DARK_GREY: DiscordColor = DiscordColor(0x607D8B);
}
