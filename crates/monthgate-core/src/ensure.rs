use crate::directory::{Channel, Directory, DirectoryError};
use crate::period::{parse_channel_name, PeriodKey};
use serde::Serialize;
use tracing::{debug, info};

/// A channel recognized as the bucket for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub period: PeriodKey,
    pub channel: Channel,
}

/// Result of making sure the current month's bucket exists.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureOutcome {
    pub bucket: Bucket,
    pub created: bool,
}

/// Split a category listing into recognized buckets and a count of
/// everything else. Channels parented elsewhere are never recognized, even
/// if the listing returned them.
pub fn recognize(category_id: &str, children: &[Channel]) -> (Vec<Bucket>, usize) {
    let mut buckets = Vec::new();
    let mut ignored = 0;
    for channel in children {
        let period = (channel.parent_id.as_deref() == Some(category_id))
            .then(|| parse_channel_name(&channel.name))
            .flatten();
        match period {
            Some(period) => buckets.push(Bucket {
                period,
                channel: channel.clone(),
            }),
            None => {
                debug!(channel = %channel.name, "ignoring unrecognized channel");
                ignored += 1;
            }
        }
    }
    buckets.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.channel.id.cmp(&b.channel.id)));
    (buckets, ignored)
}

/// Return the bucket for `period` from `buckets`, creating it under
/// `category_id` when absent. At most one create call is made.
pub(crate) async fn ensure_in(
    directory: &dyn Directory,
    category_id: &str,
    buckets: &[Bucket],
    period: PeriodKey,
) -> Result<EnsureOutcome, DirectoryError> {
    if let Some(existing) = buckets.iter().find(|b| b.period == period) {
        debug!(bucket = %existing.channel.name, "current bucket exists");
        return Ok(EnsureOutcome {
            bucket: existing.clone(),
            created: false,
        });
    }

    let name = period.channel_name();
    info!(bucket = %name, category = %category_id, "creating bucket");
    let channel = directory.create_channel(category_id, &name).await?;
    Ok(EnsureOutcome {
        bucket: Bucket { period, channel },
        created: true,
    })
}
