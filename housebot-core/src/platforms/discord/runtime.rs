use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::Embed;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};
use twilight_model::id::Id;
use twilight_model::util::Timestamp;
use twilight_util::builder::embed::{
    EmbedAuthorBuilder, EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder, ImageSource,
};

use crate::Error;
use housebot_common::models::discord::DiscordEmbed;
use housebot_common::models::MessageHandle;
use housebot_common::traits::api::MessagingClient;

pub fn parse_channel_id(channel: &str) -> Result<Id<ChannelMarker>, Error> {
    channel
        .parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .ok_or_else(|| Error::Platform(format!("Invalid channel ID: {channel}")))
}

fn parse_message_id(handle: &MessageHandle) -> Result<Id<MessageMarker>, Error> {
    handle
        .0
        .parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .ok_or_else(|| Error::Platform(format!("Invalid message ID: {handle}")))
}

fn image(url: &str) -> Result<ImageSource, Error> {
    ImageSource::url(url).map_err(|e| Error::Platform(format!("Invalid image URL {url}: {e}")))
}

/// Converts our embed model into twilight's.
pub fn build_embed(embed: &DiscordEmbed) -> Result<Embed, Error> {
    let mut builder = EmbedBuilder::new();

    if let Some(title) = &embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    if let Some(url) = &embed.url {
        builder = builder.url(url);
    }
    if let Some(color) = embed.color {
        builder = builder.color(color.0);
    }
    if let Some(author) = &embed.author {
        let mut author_builder = EmbedAuthorBuilder::new(author.name.clone());
        if let Some(url) = &author.url {
            author_builder = author_builder.url(url);
        }
        if let Some(icon) = &author.icon_url {
            author_builder = author_builder.icon_url(image(icon)?);
        }
        builder = builder.author(author_builder);
    }
    if let Some(img) = &embed.image {
        builder = builder.image(image(&img.url)?);
    }
    for field in &embed.fields {
        let mut field_builder = EmbedFieldBuilder::new(field.name.clone(), field.value.clone());
        if field.inline {
            field_builder = field_builder.inline();
        }
        builder = builder.field(field_builder);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(EmbedFooterBuilder::new(footer.text.clone()));
    }
    if let Some(ts) = embed.timestamp {
        let timestamp = Timestamp::from_secs(ts.timestamp())
            .map_err(|e| Error::Platform(format!("Invalid embed timestamp: {e}")))?;
        builder = builder.timestamp(timestamp);
    }

    Ok(builder.build())
}

/// Sends and edits monitor cards through Discord's REST API.
#[derive(Clone)]
pub struct DiscordMessenger {
    http: Arc<HttpClient>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }
}

#[async_trait]
impl MessagingClient for DiscordMessenger {
    async fn send_embed(&self, destination: &str, embed: &DiscordEmbed)
                        -> Result<MessageHandle, Error> {
        let channel_id = parse_channel_id(destination)?;
        let embeds = [build_embed(embed)?];

        let message = self
            .http
            .create_message(channel_id)
            .embeds(&embeds)
            .await
            .map_err(|e| Error::Delivery(format!("Error sending Discord message: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Delivery(format!("Error parsing sent Discord message: {e:?}")))?;

        debug!("Sent embed to channel {} as message {}", channel_id, message.id);
        Ok(MessageHandle(message.id.to_string()))
    }

    async fn edit_embed(
        &self,
        destination: &str,
        handle: &MessageHandle,
        embed: &DiscordEmbed,
    ) -> Result<(), Error> {
        let channel_id = parse_channel_id(destination)?;
        let message_id = parse_message_id(handle)?;
        let embeds = [build_embed(embed)?];

        self.http
            .update_message(channel_id, message_id)
            .content(None)
            .embeds(Some(&embeds[..]))
            .await
            .map_err(|e| Error::Delivery(format!("Error editing Discord message: {e:?}")))?;

        Ok(())
    }
}
