use url::Url;

use crate::{CallerError, Snowflake};

/// Guild used by the remote store for direct-message channels.
pub const DIRECT_MESSAGES_GUILD: &str = "@me";

/// Where a channel lives, as derived from a page location such as
/// `https://discord.com/channels/{guild}/{channel}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelContext {
    pub guild: String,
    pub channel: Option<Snowflake>,
}

impl ChannelContext {
    pub fn from_url(raw: &str) -> Result<Self, CallerError> {
        let url = Url::parse(raw.trim())
            .map_err(|err| CallerError::InvalidContext(format!("{raw}: {err}")))?;
        let mut segments = url
            .path_segments()
            .ok_or_else(|| CallerError::InvalidContext(format!("{raw}: no path")))?
            .filter(|s| !s.is_empty());

        if segments.next() != Some("channels") {
            return Err(CallerError::InvalidContext(format!(
                "{raw}: expected a /channels/{{guild}}/{{channel}} location"
            )));
        }
        let guild = segments
            .next()
            .ok_or_else(|| CallerError::InvalidContext(format!("{raw}: guild id missing")))?;
        let channel = segments
            .next()
            .map(|c| parse_segment(c, "channel id"))
            .transpose()?;

        Self::new(guild, channel)
    }

    pub fn new(guild: &str, channel: Option<Snowflake>) -> Result<Self, CallerError> {
        let guild = guild.trim();
        if guild != DIRECT_MESSAGES_GUILD {
            parse_segment(guild, "guild id")?;
        }
        Ok(Self {
            guild: guild.to_string(),
            channel,
        })
    }

    pub fn is_direct_messages(&self) -> bool {
        self.guild == DIRECT_MESSAGES_GUILD
    }
}

fn parse_segment(raw: &str, field: &'static str) -> Result<Snowflake, CallerError> {
    Snowflake::parse(raw).map_err(|source| CallerError::MalformedId { field, source })
}
