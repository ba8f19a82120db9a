use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("bot token is empty: set DISCORD_TOKEN")]
    MissingToken,

    #[error("guild_id is required for the Discord directory")]
    MissingGuild,

    #[error("bot token contains characters not allowed in a header")]
    InvalidToken,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
