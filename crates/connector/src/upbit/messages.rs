//! Upbit WebSocket v1 message types (`SIMPLE` format)
//!
//! Upstream keys are abbreviated (`cd` = market code, `tp` = trade price, ...).
//! Every field is optional at the serde level so that missing values surface
//! as validation errors naming the field rather than opaque decode failures.
//!
//! Numbers decode exactly into `Decimal` up to 28 fractional digits. Longer
//! fractions are rounded to 28 digits, so a value below `1e-28` reads as zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::message::DataType;

/// Borrowed partial parse used to classify a frame without decoding it.
#[derive(Deserialize)]
pub struct PartialUpbitMsg<'a> {
    #[serde(borrow)]
    pub ty: Option<&'a str>,
}

/// Classify a raw frame by its `ty` discriminator.
/// Returns `None` for non-JSON frames, frames without `ty` (e.g. `{"status":"UP"}`),
/// and unknown types.
pub fn classify(frame: &[u8]) -> Option<DataType> {
    let partial: PartialUpbitMsg = serde_json::from_slice(frame).ok()?;
    partial.ty.and_then(DataType::from_upstream)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpbitTicker {
    pub cd: Option<String>,
    pub tp: Option<Decimal>,
    pub tv: Option<Decimal>,
    pub op: Option<Decimal>,
    pub hp: Option<Decimal>,
    pub lp: Option<Decimal>,
    pub pcp: Option<Decimal>,
    pub atp24h: Option<Decimal>,
    pub atv24h: Option<Decimal>,
    pub tms: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpbitTrade {
    pub cd: Option<String>,
    pub tms: Option<i64>,
    /// Trade date, yyyy-MM-dd (UTC)
    pub td: Option<String>,
    /// Trade time, HH:mm:ss (UTC)
    pub ttm: Option<String>,
    pub ttms: Option<i64>,
    pub tp: Option<Decimal>,
    pub tv: Option<Decimal>,
    /// ASK or BID
    pub ab: Option<String>,
    pub pcp: Option<Decimal>,
    /// RISE, EVEN or FALL
    pub c: Option<String>,
    pub cp: Option<Decimal>,
    pub sid: Option<i64>,
    pub bap: Option<Decimal>,
    pub bas: Option<Decimal>,
    pub bbp: Option<Decimal>,
    pub bbs: Option<Decimal>,
    /// SNAPSHOT or REALTIME
    pub st: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpbitOrderBookUnit {
    pub ap: Option<Decimal>,
    #[serde(rename = "as")]
    pub ask_size: Option<Decimal>,
    pub bp: Option<Decimal>,
    pub bs: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpbitOrderBook {
    pub cd: Option<String>,
    pub tms: Option<i64>,
    pub tas: Option<Decimal>,
    pub tbs: Option<Decimal>,
    pub obu: Option<Vec<UpbitOrderBookUnit>>,
}

/// Entry of the subscription request array.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SubscriptionField<'a> {
    Ticket { ticket: String },
    Type {
        #[serde(rename = "type")]
        data_type: &'static str,
        codes: &'a [String],
    },
    Format { format: &'static str },
}

/// Build the subscription request:
/// `[{"ticket":..},{"type":"ticker","codes":[..]},..,{"format":"SIMPLE"}]`
///
/// One type entry per enabled data type, in ticker, trade, orderbook order.
pub fn subscription_request(
    ticket: &str,
    data_types: &[DataType],
    codes: &[String],
) -> Result<String, serde_json::Error> {
    let mut fields = Vec::with_capacity(data_types.len() + 2);
    fields.push(SubscriptionField::Ticket {
        ticket: ticket.to_string(),
    });
    for data_type in DataType::ALL {
        if data_types.contains(&data_type) {
            fields.push(SubscriptionField::Type {
                data_type: data_type.as_str(),
                codes,
            });
        }
    }
    fields.push(SubscriptionField::Format { format: "SIMPLE" });
    serde_json::to_string(&fields)
}
