/// The bot configuration used for anything a project's `.clabot` file does not set.
pub static DEFAULT_BOT_CONFIG: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/default/clabot.json"));

/// The name of the per-project configuration file, at the root of the repository.
pub static CLABOT_FILE: &str = ".clabot";

/// The name the bot answers to, and the context of the commit statuses it sets.
pub static BOT_NAME: &str = "gitlab-cla-bot";
