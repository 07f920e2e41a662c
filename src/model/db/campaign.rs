use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core campaign data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCore {
    pub name: String,
    /// First instant at which the campaign is open.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// First instant at which the campaign is closed again.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub enabled: bool,
}

impl CampaignCore {
    /// Is this campaign accepting responses at the given time?
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.start_date <= now && now < self.end_date
    }
}

/// A campaign from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub campaign: CampaignCore,
}

impl Deref for Campaign {
    type Target = CampaignCore;

    fn deref(&self) -> &Self::Target {
        &self.campaign
    }
}
