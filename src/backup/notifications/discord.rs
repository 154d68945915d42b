use crate::backup::function_path;
use crate::backup::notifications::Notification;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use bon::Builder;
use function_name::named;
use getset::Getters;
use std::fmt::Display;
use std::time::Duration;

static SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fire-and-forget push notification to a Discord-style webhook.
///
/// Delivery is a blocking POST of `{"content": <message>}`. Discord answers
/// 204 on success; any 2xx is accepted for compatible sinks. Failures are
/// returned to the caller, which logs and ignores them: a lost notification
/// never fails the backup or restore it reports on.
#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct DiscordNotifier {
    #[builder(into)]
    webhook_url: String,
}

impl Notification for DiscordNotifier {
    #[named]
    fn send<D: Display>(&self, msg: D) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(Error::from)
            .add_fn_name(function_path!())?;

        let response = client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "content": msg.to_string() }))
            .send()
            .map_err(Error::from)
            .add_msg(format!("Webhook POST to {:?} failed", self.webhook_url))
            .add_fn_name(function_path!())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::WebhookStatus(response.status()))
        }
    }
}
