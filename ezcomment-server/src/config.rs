/// Deployment configuration, resolved once at startup and passed around
/// immutably. Flags mirror what the fronting CMS used to decide per-site:
/// whether visitors may post without an account, whether comments await
/// moderation, and whether replying to a comment is allowed.
#[derive(Clone, Debug)]
pub struct Config {
    pub anonymous_access: bool,
    pub moderation: bool,
    pub comment_reply: bool,

    /// Envelope of the moderation notification.
    pub moderate_subject: String,
    pub moderate_from: String,
    pub moderate_to: String,

    /// Absolute URL of the moderation endpoint; approve/reject links are
    /// built on top of it.
    pub moderation_url: String,

    /// Bearer token for the administrative routes. None disables them.
    pub admin_token: Option<String>,
}
