use crate::backup::notifications::discord::DiscordNotifier;
use crate::backup::result_error::result::Result;
use derive_more::From;
use std::fmt::Display;

pub mod discord;

pub trait Notification {
    fn send<D: Display>(&self, msg: D) -> Result<()>;
}

/// Notification sink wired up from the settings file.
///
/// An empty webhook URL disables delivery entirely; send is then a no-op.
#[derive(Clone, From, Debug)]
pub enum Notifier {
    Discord(DiscordNotifier),
    Disabled,
}

impl Notifier {
    pub fn from_webhook_url<S: AsRef<str>>(url: S) -> Notifier {
        let url = url.as_ref();
        if url.is_empty() {
            Notifier::Disabled
        } else {
            DiscordNotifier::builder().webhook_url(url).build().into()
        }
    }
}

impl Notification for Notifier {
    fn send<D: Display>(&self, msg: D) -> Result<()> {
        match self {
            Self::Discord(inner) => inner.send(msg),
            Self::Disabled => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_disables_notifications() {
        let notifier = Notifier::from_webhook_url("");
        assert!(matches!(notifier, Notifier::Disabled));
        assert!(notifier.send("anything").is_ok());
    }

    #[test]
    fn test_non_empty_url_selects_discord() {
        let notifier = Notifier::from_webhook_url("https://discord.com/api/webhooks/1/abc");
        match &notifier {
            Notifier::Discord(d) => {
                assert_eq!(d.webhook_url(), "https://discord.com/api/webhooks/1/abc")
            }
            Notifier::Disabled => panic!("Expected Discord notifier"),
        }
    }
}
